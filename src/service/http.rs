use async_trait::async_trait;
use http::StatusCode;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use pingora_proxy::{ProxyHttp, Session};

use crate::config::Config;
use crate::plugin::build_plugin_executor;
use crate::proxy::plugin::ProxyPlugin;
use crate::proxy::router::{MatchEntry, ProxyRouter};
use crate::proxy::ProxyContext;

/// Gateway service.
///
/// Every route is answered by its plugin chain; nothing is forwarded upstream.
#[derive(Default)]
pub struct HttpService {
    pub matcher: MatchEntry,
}

#[async_trait]
impl ProxyHttp for HttpService {
    type CTX = ProxyContext;

    /// Creates a new context for each request
    fn new_ctx(&self) -> Self::CTX {
        Self::CTX::default()
    }

    /// Only reached when a route's plugins let the request through.
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let route = ctx
            .router
            .as_ref()
            .map(|r| r.router.id.as_str())
            .unwrap_or_default();
        Error::e_explain(
            HTTPStatus(StatusCode::BAD_GATEWAY.as_u16()),
            format!("route {route} has no terminating plugin"),
        )
    }

    /// Handle the incoming request before any downstream module is executed.
    async fn early_request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<()> {
        // Match request to pipeline
        if let Some(router) = self.matcher.match_request(session.req_header()) {
            ctx.plugin = router.plugin.clone();
            ctx.router = Some(router);
        }
        Ok(())
    }

    /// Filters incoming requests
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        if ctx.router.is_none() {
            ctx.vars.insert(
                "status".to_string(),
                StatusCode::NOT_FOUND.as_u16().to_string(),
            );
            session
                .respond_error(StatusCode::NOT_FOUND.as_u16())
                .await?;
            return Ok(true);
        }

        // execute plugins
        ctx.plugin.clone().request_filter(session, ctx).await
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        // execute plugins
        ctx.plugin.clone().logging(session, e, ctx).await;

        let status = session
            .response_written()
            .map(|resp| resp.status.as_u16().to_string())
            .or_else(|| ctx.vars.get("status").cloned())
            .unwrap_or_else(|| "-".to_string());
        let route = ctx
            .router
            .as_ref()
            .map(|r| r.router.id.as_str())
            .unwrap_or("-");

        log::info!(
            "{} {} route={} status={} elapsed={}ms{}",
            session.req_header().method,
            session.req_header().uri,
            route,
            status,
            ctx.request_start.elapsed().as_millis(),
            e.map(|e| format!(" error={e}")).unwrap_or_default()
        );
    }
}

/// Initializes the gateway service from the given configuration.
pub fn build_http_service(config: &Config) -> Result<HttpService> {
    let mut http_service = HttpService::default();
    for router in config.routers.iter() {
        log::info!("Configuring Router: {}", router.id);
        let plugin = build_plugin_executor(router)?;

        http_service
            .matcher
            .insert_router(ProxyRouter::new(router.clone(), plugin))
            .or_err_with(ReadError, || format!("Unable to register router {}", router.id))?;
    }

    Ok(http_service)
}
