pub mod composite;

use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use pingora::OkOrErr;
use pingora_error::{ErrorType::ReadError, Result};
use serde_json::Value as JsonValue;

use crate::{
    config::Router,
    proxy::plugin::{ProxyPlugin, ProxyPluginExecutor},
};

/// Factory building a plugin instance from its route configuration.
pub type PluginCreateFn = fn(JsonValue) -> Result<Arc<dyn ProxyPlugin>>;

/// Global registry mapping plugin names to their factory functions.
static PLUGIN_BUILDER_REGISTRY: Lazy<HashMap<&'static str, PluginCreateFn>> = Lazy::new(|| {
    let arr: Vec<(&str, PluginCreateFn)> = vec![
        (composite::PLUGIN_NAME, composite::create_composite_plugin), // 1000
    ];
    arr.into_iter().collect()
});

/// Creates a plugin instance from configuration.
///
/// # Errors
/// Returns `ReadError` for unknown plugin names or configuration parsing failures
pub fn build_plugin(name: &str, cfg: JsonValue) -> Result<Arc<dyn ProxyPlugin>> {
    let builder = PLUGIN_BUILDER_REGISTRY
        .get(name)
        .or_err(ReadError, "Unknown plugin type")?;
    builder(cfg)
}

/// Builds the plugin chain configured on a route.
pub fn build_plugin_executor(router: &Router) -> Result<ProxyPluginExecutor> {
    let plugins = router
        .plugins
        .iter()
        .map(|(name, cfg)| {
            log::info!("Route {} loading plugin {}", router.id, name);
            build_plugin(name, cfg.clone())
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ProxyPluginExecutor::new(plugins))
}
