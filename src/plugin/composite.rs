use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use http::{Response, StatusCode};
use once_cell::sync::Lazy;
use pingora_error::{ErrorType::ReadError, OrErr, Result};
use pingora_proxy::Session;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::{Validate, ValidationError};

use crate::{
    core::{BackendTransport, ProxyError, ProxyResult},
    orchestration::{Orchestrator, Payload, ResponseAssembler},
    proxy::{backend::HttpBackend, plugin::ProxyPlugin, ProxyContext},
    utils::{
        request::get_query_values,
        response::{content_type, ResponseBuilder},
    },
};

pub const PLUGIN_NAME: &str = "composite";
const PRIORITY: i32 = 1000;

static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:\d{1,3}\.){3}\d{1,3}|\[[0-9a-f:]+\]|[a-z0-9.-]+)$").unwrap()
});

/// Creates a composite plugin talking to the configured backend over HTTP.
pub fn create_composite_plugin(cfg: JsonValue) -> Result<Arc<dyn ProxyPlugin>> {
    let config: PluginConfig =
        serde_json::from_value(cfg).or_err_with(ReadError, || "Invalid composite plugin config")?;
    config
        .validate()
        .or_err_with(ReadError, || "Composite plugin config validation failed")?;

    let backend = HttpBackend::new(&config.backend.host, config.backend.port)?;
    log::info!(
        "Composite plugin targeting {}{} with {}ms call timeout",
        backend.base_url(),
        config.endpoint,
        config.timeout
    );

    Ok(Arc::new(PluginComposite::new(config, Arc::new(backend))))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PluginConfig {
    /// Backend path every graph node calls.
    #[serde(default = "PluginConfig::default_endpoint")]
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Per call timeout in milliseconds.
    #[serde(default = "PluginConfig::default_timeout")]
    #[validate(range(min = 1))]
    pub timeout: u64,

    /// Report rejected ids as "Error 500: ..." while still answering 400.
    #[serde(default)]
    pub legacy_error_text: bool,

    #[serde(default)]
    #[validate(nested)]
    pub backend: BackendConfig,
}

impl PluginConfig {
    fn default_endpoint() -> String {
        "/mock.json".to_string()
    }

    fn default_timeout() -> u64 {
        50
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            timeout: Self::default_timeout(),
            legacy_error_text: false,
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BackendConfig {
    #[serde(default = "BackendConfig::default_host")]
    #[validate(custom(function = "validate_backend_host"))]
    pub host: String,

    #[serde(default = "BackendConfig::default_port")]
    #[validate(range(min = 1))]
    pub port: u16,
}

impl BackendConfig {
    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        9999
    }
}

fn validate_backend_host(host: &str) -> Result<(), ValidationError> {
    if HOST_PATTERN.is_match(host) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_backend_host");
        err.add_param("host".into(), &host.to_string());
        Err(err)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// Answers a route by composing five backend calls into one JSON payload.
pub struct PluginComposite {
    config: PluginConfig,
    orchestrator: Orchestrator,
}

impl PluginComposite {
    pub fn new(config: PluginConfig, transport: Arc<dyn BackendTransport>) -> Self {
        let orchestrator = Orchestrator::new(
            transport,
            &config.endpoint,
            Duration::from_millis(config.timeout),
        );
        Self {
            config,
            orchestrator,
        }
    }

    pub async fn compose(&self, id_values: &[&str]) -> ProxyResult<Payload> {
        let outcome = self.orchestrator.resolve(id_values).await?;
        if outcome.fallback_count() > 0 {
            log::debug!(
                "Composed payload with {} fallback results",
                outcome.fallback_count()
            );
        }
        Ok(ResponseAssembler::build(&outcome))
    }

    /// Turn a composition result into the downstream response.
    pub fn render(&self, result: &ProxyResult<Payload>) -> Response<Vec<u8>> {
        match result {
            Ok(payload) => match payload.to_json() {
                Ok(body) => {
                    ResponseBuilder::success_http(body, Some(content_type::APPLICATION_JSON))
                }
                Err(e) => {
                    Self::error_text(StatusCode::INTERNAL_SERVER_ERROR, 500, &e.to_string())
                }
            },
            Err(e) => {
                let status = e.status();
                let shown = match e {
                    ProxyError::Validation(_) if self.config.legacy_error_text => 500,
                    _ => status.as_u16(),
                };
                Self::error_text(status, shown, &e.to_string())
            }
        }
    }

    fn error_text(status: StatusCode, shown: u16, message: &str) -> Response<Vec<u8>> {
        ResponseBuilder::error_http(status, &format!("Error {shown}: {message}\n"))
    }
}

#[async_trait]
impl ProxyPlugin for PluginComposite {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut ProxyContext) -> Result<bool> {
        let req_header = session.req_header();
        let uri = req_header.uri.to_string();
        let id_values = get_query_values(req_header, "id");
        let id_values: Vec<&str> = id_values.iter().map(String::as_str).collect();

        let result = self.compose(&id_values).await;
        if let Err(e) = &result {
            log::warn!("Server => Error [{uri}] => {e}");
        }

        let response = self.render(&result);
        ctx.vars
            .insert("status".to_string(), response.status().as_u16().to_string());
        ResponseBuilder::write_to_session(session, response).await?;
        Ok(true)
    }
}
