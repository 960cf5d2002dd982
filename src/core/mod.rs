//! Core abstractions for pingcompose
//!
//! Error types, the backend transport seam and process readiness.

pub mod error;
pub mod status;
pub mod traits;

pub use error::{ErrorContext, ProxyError, ProxyResult};
pub use traits::BackendTransport;
