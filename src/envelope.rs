//! Response envelope module
//!
//! Defines the JSON body shapes produced by `accept` and `reject`, and the
//! numeric-or-text status code carried in them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key forced into every envelope
pub const OK_KEY: &str = "ok";

/// HTTP status code, either numeric (`404`) or textual (`"404"`)
///
/// The variant is preserved when serialized into an envelope, so a caller
/// passing `"900"` sees `"900"` in the body, not `900`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Status {
    Code(u16),
    Text(String),
}

impl Status {
    /// Default status for `accept`
    pub const OK: Self = Self::Code(200);
    /// Default status for `reject` and `error`
    pub const INTERNAL_SERVER_ERROR: Self = Self::Code(500);

    /// Numeric code for the transport, if the status can be read as one
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }

    /// `0` and blank text carry no status
    pub fn is_unset(&self) -> bool {
        match self {
            Self::Code(code) => *code == 0,
            Self::Text(text) => text.trim().is_empty(),
        }
    }

    /// This status, or `fallback` if it is unset
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        if self.is_unset() {
            fallback
        } else {
            self
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Self::Code(code)
    }
}

impl From<&str> for Status {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Status {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<hyper::StatusCode> for Status {
    fn from(code: hyper::StatusCode) -> Self {
        Self::Code(code.as_u16())
    }
}

/// Body of a rejection response
///
/// Serializes as `{"ok": false, "message": ..., "status": ..., "trace": {...}}`.
/// The `status` field is informational for the client and may differ from the
/// transport status (see `ResponseGuard::reject_with_transport`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: String,
    pub status: Status,
    pub trace: Map<String, Value>,
}

impl Default for Rejection {
    fn default() -> Self {
        Self {
            message: String::new(),
            status: Status::default(),
            trace: Map::new(),
        }
    }
}

impl Rejection {
    /// Rejection with a message and default status and trace
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn status(mut self, status: impl Into<Status>) -> Self {
        self.status = status.into();
        self
    }

    /// Replace the whole trace object
    #[must_use]
    pub fn trace(mut self, trace: Map<String, Value>) -> Self {
        self.trace = trace;
        self
    }

    /// Add one key to the trace object
    #[must_use]
    pub fn trace_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.trace.insert(key.into(), value.into());
        self
    }

    /// Render as the JSON value sent to the client
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert(OK_KEY.to_string(), Value::Bool(false));
        body.insert("message".to_string(), Value::String(self.message.clone()));
        body.insert(
            "status".to_string(),
            match &self.status {
                Status::Code(code) => Value::from(*code),
                Status::Text(text) => Value::String(text.clone()),
            },
        );
        body.insert("trace".to_string(), Value::Object(self.trace.clone()));
        body.into()
    }
}

impl Serialize for Rejection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Force `ok: true` into an accept body, keeping every other key
pub fn accepted(mut body: Map<String, Value>) -> Value {
    body.insert(OK_KEY.to_string(), Value::Bool(true));
    Value::Object(body)
}
