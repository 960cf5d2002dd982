//! Composite response assembly.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{call::BackendResult, executor::RequestOutcome, graph::NodeLabel};

/// Composite payload: one nested object per node label, in label order.
///
/// A label missing from the outcome is emitted as the fallback sentinel so the
/// payload always carries every key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload {
    results: BTreeMap<NodeLabel, BackendResult>,
}

impl Payload {
    pub fn get(&self, label: NodeLabel) -> Option<&BackendResult> {
        self.results.get(&label)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn build(outcome: &RequestOutcome) -> Payload {
        let results = NodeLabel::ALL
            .iter()
            .map(|label| {
                let result = outcome
                    .get(*label)
                    .cloned()
                    .unwrap_or_else(BackendResult::fallback);
                (*label, result)
            })
            .collect();

        Payload { results }
    }
}
