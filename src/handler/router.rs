//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: opens an exchange for the
//! request, dispatches to an endpoint that answers through a guard, and waits
//! for whichever response reaches the exchange first.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode, Version};
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::envelope::Rejection;
use crate::guard::ResponseGuard;
use crate::http::{Exchange, ExchangeError};
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let (exchange, pending) = Exchange::open(Arc::clone(&state.http));
    if let Err(e) = dispatch(&req, &exchange, &state) {
        logger::log_error(&format!(
            "Failed to answer {} {}: {e}",
            req.method(),
            req.uri().path()
        ));
    }
    drop(req);
    // spawned emitters keep their own handles
    drop(exchange);

    let (response, outcome) = pending.wait(state.response_timeout()).await;

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = hyper::body::Body::size_hint(response.body())
            .exact()
            .unwrap_or_default();
        entry.outcome = outcome.as_str();
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Answer `req` on `exchange`
///
/// Endpoints:
/// - `/accept` → `accept({foo: "bar"})`
/// - `/reject` → `reject("Bad request", "900", {route})`
/// - `/error` → `error(501)`
/// - `/race` → two tasks answer concurrently, the first one wins
/// - health path → `accept({status: "healthy"})`
/// - anything else → `reject("Not Found", 404, {route})`
pub fn dispatch<B>(
    req: &Request<B>,
    exchange: &Arc<Exchange>,
    state: &AppState,
) -> Result<(), ExchangeError> {
    let guard = ResponseGuard::new(&**exchange);
    let path = req.uri().path();
    let route = req
        .uri()
        .path_and_query()
        .map_or_else(|| path.to_string(), ToString::to_string);

    if req.method() != Method::GET && req.method() != Method::HEAD {
        let rejection = Rejection::new("Method Not Allowed")
            .status(405)
            .trace_entry("method", req.method().as_str())
            .trace_entry("route", route);
        guard.reject(rejection)?;
        return Ok(());
    }

    match path {
        "/accept" => {
            guard.accept(object(json!({ "foo": "bar" })))?;
        }
        "/reject" => {
            let rejection = Rejection::new("Bad request")
                .status("900")
                .trace_entry("route", route);
            guard.reject(rejection)?;
        }
        "/error" => {
            guard.error(StatusCode::NOT_IMPLEMENTED)?;
        }
        "/race" => race(exchange),
        p if p == state.http.health_path => {
            guard.accept(object(json!({ "status": "healthy" })))?;
        }
        _ => {
            let rejection = Rejection::new("Not Found")
                .status(404)
                .trace_entry("route", route);
            guard.reject(rejection)?;
        }
    }
    Ok(())
}

/// Two callbacks for one request; the exchange decides which one lands
fn race(exchange: &Arc<Exchange>) {
    let accepting = Arc::clone(exchange);
    tokio::spawn(async move {
        let result = ResponseGuard::new(&accepting).accept(object(json!({ "winner": "accept" })));
        log_race_result("accept", &result);
    });

    let rejecting = Arc::clone(exchange);
    tokio::spawn(async move {
        let rejection = Rejection::new("Lost the race").status(409);
        let result = ResponseGuard::new(&rejecting).reject(rejection);
        log_race_result("reject", &result);
    });
}

fn log_race_result(contender: &str, result: &Result<bool, ExchangeError>) {
    match result {
        Ok(true) => logger::log_debug(&format!("[Race] {contender} answered")),
        Ok(false) | Err(ExchangeError::HeadersSent) => {
            logger::log_debug(&format!("[Race] {contender} was too late"));
        }
        Err(e) => logger::log_error(&format!("[Race] {contender} failed: {e}")),
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
