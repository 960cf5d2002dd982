//! Core traits for pingcompose components
//!
//! The orchestration core only ever talks to a backend through
//! [`BackendTransport`], which keeps the HTTP client out of the graph logic and
//! lets tests substitute a deterministic backend.

use async_trait::async_trait;

use super::error::ProxyResult;
use crate::orchestration::{BackendResult, CallParameters};

/// Capability to issue one parameterized backend call.
///
/// Implementations must be safe to share between concurrently running branches
/// of the same request and between requests.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Issue the call described by `params` and decode the response.
    ///
    /// Any transport, status or decode failure is returned as an error. The
    /// caller decides how failures are absorbed.
    async fn fetch(&self, params: &CallParameters) -> ProxyResult<BackendResult>;
}
