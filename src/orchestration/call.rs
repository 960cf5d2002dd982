//! Single backend call with a fixed timeout and a fallback result.

use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::core::BackendTransport;

/// Default time budget for one backend call, measured from issue time.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(50);

/// Parameters for one backend call.
///
/// `id` is the correlation identifier: either the caller supplied id for root
/// calls, or the `response_key` of the parent result for dependent calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallParameters {
    pub endpoint: Arc<str>,
    pub num_items: i64,
    pub item_size: i64,
    pub delay: i64,
    pub id: i64,
}

impl CallParameters {
    pub fn new(endpoint: Arc<str>, num_items: i64, item_size: i64, delay: i64, id: i64) -> Self {
        Self {
            endpoint,
            num_items,
            item_size,
            delay,
            id,
        }
    }

    /// Query pairs sent to the backend, in a stable order.
    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("numItems", self.num_items.to_string()),
            ("itemSize", self.item_size.to_string()),
            ("delay", self.delay.to_string()),
            ("id", self.id.to_string()),
        ]
    }
}

impl fmt::Display for CallParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?", self.endpoint)?;
        for (i, (k, v)) in self.query_pairs().iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

/// Decoded backend response.
///
/// Never absent: a failed call resolves to [`BackendResult::fallback`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResult {
    pub response_key: i64,
    pub delay: i64,
    pub num_items: i64,
    pub item_size: i64,
    #[serde(default)]
    pub items: Vec<String>,
}

impl BackendResult {
    /// The sentinel substituted for any failed call.
    pub fn fallback() -> Self {
        Self {
            response_key: 0,
            delay: -1,
            num_items: -1,
            item_size: -1,
            items: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.response_key == 0
            && self.delay == -1
            && self.num_items == -1
            && self.item_size == -1
            && self.items.is_empty()
    }
}

/// Resolve-or-fallback wrapper around a [`BackendTransport`].
///
/// Cloning is cheap; every node of a request graph holds its own clone.
#[derive(Clone)]
pub struct BackendCall {
    transport: Arc<dyn BackendTransport>,
    timeout: Duration,
}

impl BackendCall {
    pub fn new(transport: Arc<dyn BackendTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue the call and always produce a result.
    ///
    /// Timeouts, transport errors, non-success statuses and decode errors all
    /// resolve to the fallback sentinel.
    pub async fn invoke(&self, params: &CallParameters) -> BackendResult {
        match timeout(self.timeout, self.transport.fetch(params)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                log::warn!("Backend call {params} failed, using fallback: {e}");
                BackendResult::fallback()
            }
            Err(_) => {
                log::warn!(
                    "Backend call {params} timed out after {}ms, using fallback",
                    self.timeout.as_millis()
                );
                BackendResult::fallback()
            }
        }
    }
}
