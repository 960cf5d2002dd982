use async_trait::async_trait;
use http::{Response, StatusCode};
use pingora::{
    apps::http_app::ServeHttp, protocols::http::ServerSession, services::listening::Service,
};
use serde::Serialize;

use crate::{
    config::Status,
    core::status,
    utils::response::{content_type, ResponseBuilder},
};

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    routes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// Readiness endpoint served on its own listener.
///
/// `/status/ready` answers 200 `{"status":"ok","routes":N}` once the
/// configuration is loaded and every route is built, 503 before that.
pub struct StatusHttpApp {
    config: Status,
}

impl StatusHttpApp {
    pub fn new(cfg: &Status) -> Self {
        Self {
            config: cfg.clone(),
        }
    }

    pub fn status_http_service(cfg: &Status) -> Service<Self> {
        let app = Self::new(cfg);
        let addr = app.config.address.to_string();
        let mut service = Service::new("Status HTTP".to_string(), app);
        service.add_tcp(&addr);
        service
    }

    fn route(path: &str) -> Response<Vec<u8>> {
        match path {
            "/status/ready" => Self::ready(),
            _ => ResponseBuilder::error_http(StatusCode::NOT_FOUND, "Not Found"),
        }
    }

    fn ready() -> Response<Vec<u8>> {
        if status::is_ready() {
            let response = StatusResponse {
                status: "ok",
                routes: Some(status::route_count()),
                error: None,
            };
            ResponseBuilder::json(StatusCode::OK, &response)
        } else {
            let response = StatusResponse {
                status: "error",
                routes: None,
                error: Some("Configuration not loaded yet"),
            };
            ResponseBuilder::json(StatusCode::SERVICE_UNAVAILABLE, &response)
        }
    }
}

#[async_trait]
impl ServeHttp for StatusHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        http_session.set_keepalive(None);
        Self::route(http_session.req_header().uri.path())
    }
}

#[cfg(test)]
mod tests {
    use http::header;

    use super::*;
    use crate::core::status::tests::TEST_LOCK;

    #[test]
    fn test_not_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        status::reset();

        let response = StatusHttpApp::route("/status/ready");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.body(),
            br#"{"status":"error","error":"Configuration not loaded yet"}"#
        );
    }

    #[test]
    fn test_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        status::reset();
        status::mark_ready(2);

        let response = StatusHttpApp::route("/status/ready");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            content_type::APPLICATION_JSON
        );
        assert_eq!(response.body(), br#"{"status":"ok","routes":2}"#);
        status::reset();
    }

    #[test]
    fn test_unknown_path() {
        let response = StatusHttpApp::route("/status/live");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
