//! Responder capability module
//!
//! The seam between the response guard and whatever HTTP stack actually
//! writes bytes to the client.

use crate::envelope::Status;
use serde_json::Value;

/// A per-request handle able to emit one response
///
/// Methods take `&self` so several guards (possibly on different tasks) can
/// borrow the same handle; implementations keep their own interior state.
/// After a successful `send_json` or `send_status`, `headers_sent` must
/// return `Some(true)`.
pub trait Responder {
    /// Error raised by the transport while emitting
    type Error;

    /// Whether a response already left this handle
    ///
    /// `None` means the state is unknown.
    fn headers_sent(&self) -> Option<bool>;

    /// Set the transport status and emit `body` as JSON
    fn send_json(&self, status: &Status, body: &Value) -> Result<(), Self::Error>;

    /// Emit a status-only response with the transport's default body
    fn send_status(&self, status: &Status) -> Result<(), Self::Error>;
}

impl<R: Responder + ?Sized> Responder for std::sync::Arc<R> {
    type Error = R::Error;

    fn headers_sent(&self) -> Option<bool> {
        (**self).headers_sent()
    }

    fn send_json(&self, status: &Status, body: &Value) -> Result<(), Self::Error> {
        (**self).send_json(status, body)
    }

    fn send_status(&self, status: &Status) -> Result<(), Self::Error> {
        (**self).send_status(status)
    }
}
