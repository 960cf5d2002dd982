//! Deterministic in-process backend used by the unit tests.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{
    call::{BackendResult, CallParameters},
    graph::NodeLabel,
};
use crate::core::{BackendTransport, ProxyError, ProxyResult};

/// What the mock does with one call.
pub(crate) enum Behavior {
    Respond,
    Delay(Duration),
    Hang,
    Fail(ProxyError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EventKind {
    Started,
    Finished,
}

#[derive(Clone, Debug)]
pub(crate) struct Event {
    pub label: Option<NodeLabel>,
    pub kind: EventKind,
    pub at: Duration,
}

type BehaviorFn = Box<dyn Fn(&CallParameters) -> Behavior + Send + Sync>;

pub(crate) struct MockBackend {
    behavior: BehaviorFn,
    created: Instant,
    calls: Mutex<Vec<CallParameters>>,
    events: Mutex<Vec<Event>>,
}

impl MockBackend {
    pub fn new<F>(behavior: F) -> Self
    where
        F: Fn(&CallParameters) -> Behavior + Send + Sync + 'static,
    {
        Self {
            behavior: Box::new(behavior),
            created: Instant::now(),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Identify which composite node issued a call from its shape.
    pub fn label_of(params: &CallParameters) -> Option<NodeLabel> {
        match (params.num_items, params.item_size) {
            (2, 50) => Some(NodeLabel::A),
            (25, 30) => Some(NodeLabel::B),
            (1, 5000) => Some(NodeLabel::C),
            (1, 1000) => Some(NodeLabel::D),
            (100, 30) => Some(NodeLabel::E),
            _ => None,
        }
    }

    /// Response key the mock returns for a call. Never zero for positive sizes.
    pub fn key_for(params: &CallParameters) -> i64 {
        params
            .id
            .wrapping_mul(1000)
            .wrapping_add(params.num_items * 7 + params.item_size)
    }

    fn respond(params: &CallParameters) -> BackendResult {
        let count = params.num_items.clamp(0, 100) as usize;
        let size = params.item_size.clamp(0, 64) as usize;
        BackendResult {
            response_key: Self::key_for(params),
            delay: params.delay,
            num_items: params.num_items,
            item_size: params.item_size,
            items: vec!["x".repeat(size); count],
        }
    }

    fn record(&self, params: &CallParameters, kind: EventKind) {
        self.events.lock().unwrap().push(Event {
            label: Self::label_of(params),
            kind,
            at: self.created.elapsed(),
        });
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Parameters of the first call issued by `label`.
    pub fn params_for(&self, label: NodeLabel) -> Option<CallParameters> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|p| Self::label_of(p) == Some(label))
            .cloned()
    }

    /// Time since mock creation of the first matching event.
    pub fn event_at(&self, label: NodeLabel, kind: EventKind) -> Option<Duration> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.label == Some(label) && e.kind == kind)
            .map(|e| e.at)
    }

    /// Position of the first matching event in the global event order.
    pub fn sequence_index(&self, label: NodeLabel, kind: EventKind) -> Option<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.label == Some(label) && e.kind == kind)
    }
}

#[async_trait]
impl BackendTransport for MockBackend {
    async fn fetch(&self, params: &CallParameters) -> ProxyResult<BackendResult> {
        self.calls.lock().unwrap().push(params.clone());
        self.record(params, EventKind::Started);

        match (self.behavior)(params) {
            Behavior::Respond => {}
            Behavior::Delay(delay) => tokio::time::sleep(delay).await,
            Behavior::Hang => futures::future::pending::<()>().await,
            Behavior::Fail(e) => return Err(e),
        }

        self.record(params, EventKind::Finished);
        Ok(Self::respond(params))
    }
}
