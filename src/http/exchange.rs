//! Exchange module
//!
//! `Exchange` is the responder handle for one hyper request. The response
//! travels to the connection task through a oneshot channel; the sender sits
//! in a slot until a guard takes it, and "headers sent" simply means the slot
//! is empty. Handlers may clone the `Arc<Exchange>` into spawned tasks, and
//! whichever guard empties the slot first answers the request.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

use super::response::{self, BuildError};
use crate::config::HttpConfig;
use crate::envelope::Status;
use crate::logger;
use crate::responder::Responder;

type HttpResponse = Response<Full<Bytes>>;

/// How a request ended up being answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `accept` or `reject`
    Json,
    /// `error`
    Status,
    /// Nothing answered before the response timeout
    Timeout,
    /// The exchange went away without answering
    Abandoned,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Status => "status",
            Self::Timeout => "timeout",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Transport failure while emitting on an exchange
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("invalid status code: {0}")]
    InvalidStatus(String),
    /// Another emitter answered between the guard's check and this send
    #[error("response already sent")]
    HeadersSent,
    #[error("response slot poisoned")]
    Poisoned,
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Per-request responder handle backed by hyper
pub struct Exchange {
    slot: Mutex<Option<oneshot::Sender<(HttpResponse, Outcome)>>>,
    http: Arc<HttpConfig>,
}

impl Exchange {
    /// Open an exchange and the pending response the connection awaits
    pub fn open(http: Arc<HttpConfig>) -> (Arc<Self>, PendingResponse) {
        let (tx, rx) = oneshot::channel();
        let exchange = Arc::new(Self {
            slot: Mutex::new(Some(tx)),
            http: Arc::clone(&http),
        });
        let pending = PendingResponse {
            exchange: Arc::downgrade(&exchange),
            http,
            rx,
        };
        (exchange, pending)
    }

    /// Mark the exchange answered without emitting; `true` if it was open
    fn close(&self) -> bool {
        match self.slot.lock() {
            Ok(mut slot) => slot.take().is_some(),
            Err(poisoned) => poisoned.into_inner().take().is_some(),
        }
    }

    fn deliver(&self, response: HttpResponse, outcome: Outcome) -> Result<(), ExchangeError> {
        let sender = self
            .slot
            .lock()
            .map_err(|_| ExchangeError::Poisoned)?
            .take()
            .ok_or(ExchangeError::HeadersSent)?;
        if sender.send((response, outcome)).is_err() {
            logger::log_warning("Response dropped: connection no longer waiting");
        }
        Ok(())
    }
}

/// Transport status for an envelope status, if it is a valid HTTP code
fn transport_status(status: &Status) -> Result<StatusCode, ExchangeError> {
    status
        .code()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| ExchangeError::InvalidStatus(status.to_string()))
}

impl Responder for Exchange {
    type Error = ExchangeError;

    fn headers_sent(&self) -> Option<bool> {
        // poisoned: unknown
        self.slot.lock().ok().map(|slot| slot.is_none())
    }

    fn send_json(&self, status: &Status, body: &Value) -> Result<(), ExchangeError> {
        let status = transport_status(status)?;
        let response = response::build_json_response(status, body, &self.http)?;
        self.deliver(response, Outcome::Json)
    }

    fn send_status(&self, status: &Status) -> Result<(), ExchangeError> {
        let status = transport_status(status)?;
        let response = response::build_status_response(status, &self.http)?;
        self.deliver(response, Outcome::Status)
    }
}

/// Receiving side of an exchange, awaited by the connection task
///
/// Holds the exchange weakly: once the last handler handle drops without
/// answering, the sender goes with it and the wait ends as abandoned.
pub struct PendingResponse {
    exchange: Weak<Exchange>,
    http: Arc<HttpConfig>,
    rx: oneshot::Receiver<(HttpResponse, Outcome)>,
}

impl PendingResponse {
    /// Wait for the handler's response
    ///
    /// After `timeout` the exchange is closed, so late guards decline, and a
    /// bare 503 is returned instead. An exchange dropped unanswered yields a
    /// bare 500 right away.
    pub async fn wait(mut self, timeout: Duration) -> (HttpResponse, Outcome) {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(delivered)) => delivered,
            Ok(Err(_)) => self.abandoned(),
            Err(_) => {
                let closed = self.exchange.upgrade().is_some_and(|exchange| exchange.close());
                if closed {
                    logger::log_warning(&format!(
                        "No response after {}ms, answering 503",
                        timeout.as_millis()
                    ));
                    let response =
                        response::fallback_response(StatusCode::SERVICE_UNAVAILABLE, &self.http);
                    (response, Outcome::Timeout)
                } else {
                    // an emitter took the sender just as the timer fired,
                    // or the exchange is gone and the channel is closing
                    match (&mut self.rx).await {
                        Ok(delivered) => delivered,
                        Err(_) => self.abandoned(),
                    }
                }
            }
        }
    }

    fn abandoned(&self) -> (HttpResponse, Outcome) {
        logger::log_error("Exchange closed without a response");
        let response =
            response::fallback_response(StatusCode::INTERNAL_SERVER_ERROR, &self.http);
        (response, Outcome::Abandoned)
    }
}
