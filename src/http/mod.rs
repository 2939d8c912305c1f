//! HTTP responder module
//!
//! Binds the response guard to hyper: `Exchange` is the per-request
//! responder handle, `response` builds the actual hyper responses.

mod exchange;
pub mod response;

pub use exchange::{Exchange, ExchangeError, Outcome, PendingResponse};
