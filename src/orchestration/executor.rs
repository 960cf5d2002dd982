//! Graph execution
//!
//! Every node runs as its own Tokio task. A node task first waits on the
//! shared completion of its parents, derives its parameters from their
//! results, then issues its backend call. The orchestrator returns once every
//! node task has finished.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use futures::{
    future::{join_all, BoxFuture, Shared},
    FutureExt,
};

use super::{
    call::{BackendCall, BackendResult},
    graph::{DependencyGraph, NodeLabel},
};
use crate::core::{BackendTransport, ProxyError, ProxyResult};

/// Message used when the inbound request has no usable `id`.
pub const INVALID_ID_MESSAGE: &str =
    "Please provide a numerical 'id' value. It can be a random number (uuid).";

/// Completion of one node task, cloneable so several children can await it.
type NodeCompletion = Shared<BoxFuture<'static, Result<Arc<BackendResult>, Arc<str>>>>;

/// Resolved results of every node in a request, keyed by label.
///
/// Built once by the orchestrator and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOutcome {
    results: BTreeMap<NodeLabel, Arc<BackendResult>>,
}

impl RequestOutcome {
    pub fn get(&self, label: NodeLabel) -> Option<&BackendResult> {
        self.results.get(&label).map(Arc::as_ref)
    }

    /// Results in label order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeLabel, &BackendResult)> {
        self.results.iter().map(|(label, r)| (*label, r.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn fallback_count(&self) -> usize {
        self.results.values().filter(|r| r.is_fallback()).count()
    }
}

/// Parse the `id` query values of an inbound request.
///
/// Exactly one value is accepted and it must parse as a signed 64-bit integer
/// as is; surrounding whitespace is rejected.
pub fn parse_input_id(values: &[&str]) -> ProxyResult<i64> {
    match values {
        [value] => value
            .parse::<i64>()
            .map_err(|_| ProxyError::Validation(INVALID_ID_MESSAGE.to_string())),
        _ => Err(ProxyError::Validation(INVALID_ID_MESSAGE.to_string())),
    }
}

/// Runs the composite dependency graph for inbound requests.
pub struct Orchestrator {
    call: BackendCall,
    endpoint: Arc<str>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn BackendTransport>, endpoint: &str, timeout: Duration) -> Self {
        Self {
            call: BackendCall::new(transport, timeout),
            endpoint: Arc::from(endpoint),
        }
    }

    /// Validate the inbound `id` values and resolve the composite graph.
    ///
    /// Fails with [`ProxyError::Validation`] before any backend call when the
    /// id is missing, repeated or not numeric. Backend failures never fail the
    /// request; they show up as fallback results in the outcome.
    pub async fn resolve(&self, id_values: &[&str]) -> ProxyResult<RequestOutcome> {
        let input_id = parse_input_id(id_values)?;
        let graph = DependencyGraph::composite(input_id, self.endpoint.clone())?;
        self.execute(&graph).await
    }

    /// Execute any validated graph.
    ///
    /// Roots start immediately. A dependent node starts only after all of its
    /// parents resolved, successfully or with a fallback. Only a node task that
    /// never finishes normally (panic, runtime shutdown) fails the execution.
    pub async fn execute(&self, graph: &DependencyGraph) -> ProxyResult<RequestOutcome> {
        let mut completions: BTreeMap<NodeLabel, NodeCompletion> = BTreeMap::new();

        for node in graph.nodes() {
            let parents: Vec<NodeCompletion> = node
                .parents
                .iter()
                .filter_map(|p| completions.get(p).cloned())
                .collect();
            let call = self.call.clone();
            let source = node.source.clone();
            let label = node.label;

            let task = tokio::spawn(async move {
                let mut resolved = Vec::with_capacity(parents.len());
                for parent in join_all(parents).await {
                    resolved.push(parent?);
                }

                let params = source.resolve(&resolved);
                log::debug!("Node {label} issuing {params}");
                let result = call.invoke(&params).await;
                if result.is_fallback() {
                    log::debug!("Node {label} resolved with fallback");
                }
                Ok::<_, Arc<str>>(Arc::new(result))
            });

            let completion = task
                .map(move |joined| match joined {
                    Ok(outcome) => outcome,
                    Err(e) => Err(Arc::from(format!("node {label} task failed: {e}"))),
                })
                .boxed()
                .shared();
            completions.insert(label, completion);
        }

        let (labels, pending): (Vec<_>, Vec<_>) = completions.into_iter().unzip();
        let mut results = BTreeMap::new();
        for (label, joined) in labels.into_iter().zip(join_all(pending).await) {
            let result = joined.map_err(|e| ProxyError::Internal(e.to_string()))?;
            results.insert(label, result);
        }

        Ok(RequestOutcome { results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::{
        call::{CallParameters, DEFAULT_CALL_TIMEOUT},
        graph::DependencyNode,
        mock::{Behavior, EventKind, MockBackend},
    };

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn orchestrator(backend: &Arc<MockBackend>) -> Orchestrator {
        Orchestrator::new(backend.clone(), "/mock.json", DEFAULT_CALL_TIMEOUT)
    }

    #[test]
    fn test_parse_input_id() {
        assert_eq!(parse_input_id(&["42"]).unwrap(), 42);
        assert_eq!(parse_input_id(&["-7"]).unwrap(), -7);
        assert!(parse_input_id(&[" 42"]).is_err());
        assert!(parse_input_id(&["42 "]).is_err());
        assert!(parse_input_id(&[]).is_err());
        assert!(parse_input_id(&["abc"]).is_err());
        assert!(parse_input_id(&[""]).is_err());
        assert!(parse_input_id(&["1", "2"]).is_err());
        assert!(parse_input_id(&["99999999999999999999"]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_success() {
        init_log();
        let backend = Arc::new(MockBackend::new(|_| Behavior::Respond));
        let outcome = orchestrator(&backend).resolve(&["42"]).await.unwrap();

        assert_eq!(outcome.len(), 5);
        assert_eq!(outcome.fallback_count(), 0);
        for (label, result) in outcome.iter() {
            assert_ne!(result.response_key, 0, "node {label}");
        }
        assert_eq!(backend.call_count(), 5);

        let a = outcome.get(NodeLabel::A).unwrap();
        let c_params = backend.params_for(NodeLabel::C).unwrap();
        assert_eq!(c_params.id, a.response_key);
        let b = outcome.get(NodeLabel::B).unwrap();
        let e_params = backend.params_for(NodeLabel::E).unwrap();
        assert_eq!(e_params.id, b.response_key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_timeouts_yield_sentinels() {
        init_log();
        let backend = Arc::new(MockBackend::new(|_| Behavior::Hang));
        let outcome = orchestrator(&backend).resolve(&["42"]).await.unwrap();

        assert_eq!(outcome.len(), 5);
        for (_, result) in outcome.iter() {
            assert_eq!(result, &BackendResult::fallback());
        }
        assert_eq!(backend.call_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_timeout_still_runs_children() {
        init_log();
        let backend = Arc::new(MockBackend::new(|params| {
            match MockBackend::label_of(params) {
                Some(NodeLabel::A) => Behavior::Hang,
                _ => Behavior::Respond,
            }
        }));
        let outcome = orchestrator(&backend).resolve(&["42"]).await.unwrap();

        assert!(outcome.get(NodeLabel::A).unwrap().is_fallback());
        assert_eq!(outcome.fallback_count(), 1);
        assert_eq!(backend.params_for(NodeLabel::C).unwrap().id, 0);
        assert_eq!(backend.params_for(NodeLabel::D).unwrap().id, 0);

        let c_start = backend.event_at(NodeLabel::C, EventKind::Started).unwrap();
        assert!(c_start >= DEFAULT_CALL_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_children_start_after_parents_resolve() {
        init_log();
        let backend = Arc::new(MockBackend::new(|params| {
            Behavior::Delay(Duration::from_millis(match MockBackend::label_of(params) {
                Some(NodeLabel::A) => 10,
                Some(NodeLabel::B) => 30,
                _ => 5,
            }))
        }));
        let outcome = orchestrator(&backend).resolve(&["42"]).await.unwrap();
        assert_eq!(outcome.fallback_count(), 0);

        let a_start = backend.event_at(NodeLabel::A, EventKind::Started).unwrap();
        let b_start = backend.event_at(NodeLabel::B, EventKind::Started).unwrap();
        assert_eq!(a_start, Duration::ZERO);
        assert_eq!(b_start, Duration::ZERO);

        let a_done = backend.event_at(NodeLabel::A, EventKind::Finished).unwrap();
        let b_done = backend.event_at(NodeLabel::B, EventKind::Finished).unwrap();
        for child in [NodeLabel::C, NodeLabel::D] {
            assert!(backend.event_at(child, EventKind::Started).unwrap() >= a_done);
        }
        assert!(backend.event_at(NodeLabel::E, EventKind::Started).unwrap() >= b_done);

        assert!(backend.sequence_index(NodeLabel::C, EventKind::Started)
            > backend.sequence_index(NodeLabel::A, EventKind::Finished));
        assert!(backend.sequence_index(NodeLabel::E, EventKind::Started)
            > backend.sequence_index(NodeLabel::B, EventKind::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_group_does_not_block_fast_group() {
        init_log();
        let backend = Arc::new(MockBackend::new(|params| {
            match MockBackend::label_of(params) {
                Some(NodeLabel::B) => Behavior::Delay(Duration::from_millis(40)),
                _ => Behavior::Respond,
            }
        }));
        orchestrator(&backend).resolve(&["42"]).await.unwrap();

        let d_done = backend.event_at(NodeLabel::D, EventKind::Finished).unwrap();
        let e_start = backend.event_at(NodeLabel::E, EventKind::Started).unwrap();
        assert!(d_done < e_start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_id_issues_no_calls() {
        init_log();
        let backend = Arc::new(MockBackend::new(|_| Behavior::Respond));
        let orchestrator = orchestrator(&backend);

        for values in [vec![], vec!["abc"], vec!["1", "2"]] {
            let err = orchestrator.resolve(&values).await.unwrap_err();
            assert!(matches!(err, ProxyError::Validation(_)));
        }
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_is_idempotent() {
        let backend = Arc::new(MockBackend::new(|_| Behavior::Respond));
        let orchestrator = orchestrator(&backend);

        let first = orchestrator.resolve(&["42"]).await.unwrap();
        let second = orchestrator.resolve(&["42"]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.call_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_node_is_systemic_failure() {
        let backend = Arc::new(MockBackend::new(|_| Behavior::Respond));
        let params = CallParameters::new(Arc::from("/mock.json"), 1, 1, 1, 1);
        let graph = DependencyGraph::new(vec![
            DependencyNode::root(NodeLabel::A, params),
            DependencyNode::dependent(NodeLabel::C, vec![NodeLabel::A], |_| {
                panic!("parameter derivation failed")
            }),
        ])
        .unwrap();

        let err = orchestrator(&backend).execute(&graph).await.unwrap_err();
        assert!(matches!(err, ProxyError::Internal(_)));
        assert!(err.to_string().contains("node C"));
    }
}
