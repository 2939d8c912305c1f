//! Standardized JSON responses for HTTP handlers.
//!
//! A [`ResponseGuard`] wraps the per-request [`Responder`] and offers three
//! terminal operations, `accept`, `reject` and `error`, of which only the
//! first call reaching an open handle emits anything. Later calls return
//! `Ok(false)`. The [`http::Exchange`] responder binds the guard to hyper.

pub mod config;
pub mod envelope;
pub mod guard;
pub mod handler;
pub mod http;
pub mod logger;
pub mod responder;
pub mod server;

pub use envelope::{Rejection, Status};
pub use guard::ResponseGuard;
pub use http::{Exchange, ExchangeError, PendingResponse};
pub use responder::Responder;
