//! Request handler module
//!
//! Demo endpoints answering through `ResponseGuard`.

mod router;

pub use router::{dispatch, handle_request};
