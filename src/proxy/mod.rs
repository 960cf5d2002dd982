pub mod backend;
pub mod plugin;
pub mod router;

use std::{collections::HashMap, sync::Arc, time::Instant};

use plugin::ProxyPluginExecutor;
use router::ProxyRouter;

/// Proxy context.
///
/// Holds the context for each request.
pub struct ProxyContext {
    pub router: Option<Arc<ProxyRouter>>,
    pub request_start: Instant,
    pub plugin: Arc<ProxyPluginExecutor>,
    pub vars: HashMap<String, String>,
}

impl Default for ProxyContext {
    fn default() -> Self {
        Self {
            router: None,
            request_start: Instant::now(),
            plugin: Arc::new(ProxyPluginExecutor::default()),
            vars: HashMap::new(),
        }
    }
}
