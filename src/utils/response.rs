//! Response building helpers shared by route plugins and the status service.

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use pingora_error::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::Session;
use serde::Serialize;

/// Standard content types
pub mod content_type {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const APPLICATION_JSON: &str = "application/json";
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Build a success HTTP Response
    pub fn success_http(body: Vec<u8>, content_type: Option<&str>) -> Response<Vec<u8>> {
        Self::with_status(StatusCode::OK, body, content_type)
    }

    /// Build a plain-text error HTTP Response
    pub fn error_http(status: StatusCode, message: &str) -> Response<Vec<u8>> {
        Self::with_status(
            status,
            message.as_bytes().to_vec(),
            Some(content_type::TEXT_PLAIN),
        )
    }

    /// Build a JSON HTTP Response with the given status
    pub fn json<T: Serialize>(status: StatusCode, data: &T) -> Response<Vec<u8>> {
        match serde_json::to_vec(data) {
            Ok(json_body) => {
                Self::with_status(status, json_body, Some(content_type::APPLICATION_JSON))
            }
            Err(e) => {
                log::error!("Failed to serialize JSON response: {}", e);
                Self::error_http(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "JSON serialization failed",
                )
            }
        }
    }

    fn with_status(
        status: StatusCode,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Response<Vec<u8>> {
        let mut response = Response::new(body);
        *response.status_mut() = status;

        if let Some(ct) = content_type {
            match HeaderValue::from_str(ct) {
                Ok(header_value) => {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_TYPE, header_value);
                }
                Err(e) => {
                    log::error!("Invalid content type '{}': {}", ct, e);
                }
            }
        }

        response
    }

    /// Write a fully built response to the downstream session and end the stream.
    pub async fn write_to_session(session: &mut Session, response: Response<Vec<u8>>) -> Result<()> {
        let (parts, body) = response.into_parts();

        let mut resp = ResponseHeader::build(parts.status, Some(parts.headers.len() + 1))?;
        for (name, value) in parts.headers.iter() {
            resp.insert_header(name.clone(), value.clone())?;
        }
        resp.insert_header(header::CONTENT_LENGTH, body.len().to_string())?;

        session
            .write_response_header(Box::new(resp), body.is_empty())
            .await?;

        if !body.is_empty() {
            session
                .write_response_body(Some(Bytes::from(body)), true)
                .await?;
        }

        Ok(())
    }
}
