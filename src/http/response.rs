//! HTTP response building module
//!
//! Builders for the two response shapes an exchange can emit: a JSON body
//! with an arbitrary status, and a bare status with its reason phrase.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde_json::Value;

use crate::config::HttpConfig;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Default body for a bare status: the reason phrase, or the code itself
pub fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| status.as_u16().to_string(), ToString::to_string)
}

/// Build a JSON response
pub fn build_json_response(
    status: StatusCode,
    body: &Value,
    http: &HttpConfig,
) -> Result<Response<Full<Bytes>>, BuildError> {
    let json = if http.pretty_json {
        serde_json::to_vec_pretty(body)?
    } else {
        serde_json::to_vec(body)?
    };
    Ok(base_builder(status, JSON_CONTENT_TYPE, http).body(Full::new(Bytes::from(json)))?)
}

/// Build a bare status response
pub fn build_status_response(
    status: StatusCode,
    http: &HttpConfig,
) -> Result<Response<Full<Bytes>>, BuildError> {
    Ok(base_builder(status, TEXT_CONTENT_TYPE, http)
        .body(Full::new(Bytes::from(status_text(status))))?)
}

/// Bare status response that cannot fail, for fallbacks outside a guard
pub fn fallback_response(status: StatusCode, http: &HttpConfig) -> Response<Full<Bytes>> {
    build_status_response(status, http).unwrap_or_else(|e| {
        crate::logger::log_error(&format!("Failed to build {status} response: {e}"));
        let mut response = Response::new(Full::new(Bytes::from(status_text(status))));
        *response.status_mut() = status;
        response
    })
}

fn base_builder(
    status: StatusCode,
    content_type: &str,
    http: &HttpConfig,
) -> hyper::http::response::Builder {
    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .header("Server", &http.server_name);

    if http.enable_cors {
        builder = builder.header("Access-Control-Allow-Origin", "*");
    }
    builder
}

/// Failure while assembling a response
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to build response: {0}")]
    Http(#[from] hyper::http::Error),
}
