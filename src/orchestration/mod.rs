//! Request orchestration
//!
//! Fans one inbound request out into a dependency graph of backend calls,
//! absorbs per-call failures into fallback results and joins every branch
//! into a single composite payload.

pub mod assembler;
pub mod call;
pub mod executor;
pub mod graph;

#[cfg(test)]
pub(crate) mod mock;

pub use assembler::{Payload, ResponseAssembler};
pub use call::{BackendCall, BackendResult, CallParameters, DEFAULT_CALL_TIMEOUT};
pub use executor::{parse_input_id, Orchestrator, RequestOutcome, INVALID_ID_MESSAGE};
pub use graph::{DependencyGraph, DependencyNode, NodeLabel, ParamSource};
