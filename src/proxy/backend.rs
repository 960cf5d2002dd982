//! HTTP transport to the composite backend.

use async_trait::async_trait;

use crate::{
    core::{BackendTransport, ErrorContext, ProxyError, ProxyResult},
    orchestration::{BackendResult, CallParameters},
};

/// Issues backend calls over HTTP with a shared connection pool.
///
/// Time budgets are enforced by [`crate::orchestration::BackendCall`], not here.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(host: &str, port: u16) -> ProxyResult<Self> {
        // backends are addressed directly, never through an environment proxy
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .with_context("Unable to build backend client")?;
        Ok(Self {
            base_url: format!("http://{host}:{port}"),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, params: &CallParameters) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            params.endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl BackendTransport for HttpBackend {
    async fn fetch(&self, params: &CallParameters) -> ProxyResult<BackendResult> {
        let response = self
            .client
            .get(self.url_for(params))
            .query(&params.query_pairs())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus(status.as_u16()));
        }

        Ok(response.json::<BackendResult>().await?)
    }
}
