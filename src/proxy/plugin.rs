use std::sync::Arc;

use async_trait::async_trait;
use pingora_error::{Error, Result};
use pingora_proxy::Session;

use super::ProxyContext;

#[async_trait]
pub trait ProxyPlugin: Send + Sync {
    /// Return the name of this plugin
    fn name(&self) -> &str;

    /// Return the priority of this plugin. Higher priorities run first.
    fn priority(&self) -> i32;

    /// Handle the incoming request.
    ///
    /// In this phase, plugins can parse, validate and/or respond to the request.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if a response was sent and the proxy should exit
    /// * `Ok(false)` if the proxy should continue to the next plugin
    async fn request_filter(
        &self,
        _session: &mut Session,
        _ctx: &mut ProxyContext,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Called once the response has been sent downstream, or the request was
    /// terminated by a fatal error. Used for access logs.
    async fn logging(&self, _session: &mut Session, _e: Option<&Error>, _ctx: &mut ProxyContext) {}
}

/// Runs a route's plugins in priority order.
#[derive(Default)]
pub struct ProxyPluginExecutor {
    pub plugins: Vec<Arc<dyn ProxyPlugin>>,
}

impl ProxyPluginExecutor {
    pub fn new(mut plugins: Vec<Arc<dyn ProxyPlugin>>) -> Self {
        plugins.sort_by_key(|p| -p.priority());
        Self { plugins }
    }
}

#[async_trait]
impl ProxyPlugin for ProxyPluginExecutor {
    fn name(&self) -> &str {
        "plugin-executor"
    }

    fn priority(&self) -> i32 {
        0
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut ProxyContext) -> Result<bool> {
        for plugin in self.plugins.iter() {
            if plugin.request_filter(session, ctx).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut ProxyContext) {
        for plugin in self.plugins.iter() {
            plugin.logging(session, e, ctx).await;
        }
    }
}
