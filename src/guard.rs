//! Response guard module
//!
//! `ResponseGuard` wraps a borrowed `Responder` and lets a handler answer a
//! request at most once. Whether the request is still open is read from the
//! responder on every call, never remembered by the guard, so a response sent
//! through another guard on the same handle is respected too.
//!
//! ```ignore
//! let guard = ResponseGuard::new(&exchange);
//! guard.accept(body)?;                               // 200 {"ok":true,...}
//! guard.reject(Rejection::new("Wrong password").status(401))?; // false, already sent
//! ```

use serde_json::{Map, Value};

use crate::envelope::{self, Rejection, Status};
use crate::logger;
use crate::responder::Responder;

/// At-most-once response helper bound to one responder handle
pub struct ResponseGuard<'a, R: ?Sized> {
    res: Option<&'a R>,
}

impl<R: ?Sized> Clone for ResponseGuard<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ?Sized> Copy for ResponseGuard<'_, R> {}

impl<'a, R: Responder + ?Sized> ResponseGuard<'a, R> {
    pub const fn new(res: &'a R) -> Self {
        Self { res: Some(res) }
    }

    /// Guard without a handle; every operation declines
    pub const fn detached() -> Self {
        Self { res: None }
    }

    /// `true` while no response has been sent on the handle
    ///
    /// An absent handle or an unknown headers-sent state counts as sent.
    pub fn proceed(&self) -> bool {
        let headers_sent = self
            .res
            .and_then(|res| res.headers_sent())
            .unwrap_or(true);
        !headers_sent
    }

    /// Same as [`proceed`](Self::proceed)
    pub fn has_not_responded(&self) -> bool {
        self.proceed()
    }

    /// Send `body` with status 200 and `ok: true` added
    pub fn accept(&self, body: Map<String, Value>) -> Result<bool, R::Error> {
        self.accept_with_status(body, Status::OK)
    }

    /// Send `body` with the given status and `ok: true` added
    ///
    /// An unset status (`0` or blank) falls back to 200. Returns `Ok(false)` without touching the handle if a response was
    /// already sent.
    pub fn accept_with_status(
        &self,
        body: Map<String, Value>,
        status: impl Into<Status>,
    ) -> Result<bool, R::Error> {
        let Some(res) = self.open("accept") else {
            return Ok(false);
        };
        res.send_json(&status.into().or(Status::OK), &envelope::accepted(body))?;
        Ok(true)
    }

    /// Send a `{ok: false, message, status, trace}` body
    ///
    /// The transport status is the rejection's own `status`. An unset status
    /// becomes 500, in the body as well.
    pub fn reject(&self, mut rejection: Rejection) -> Result<bool, R::Error> {
        rejection.status = rejection.status.or(Status::INTERNAL_SERVER_ERROR);
        let transport = rejection.status.clone();
        self.reject_with_transport(transport, rejection)
    }

    /// Like [`reject`](Self::reject), with a transport status that may differ
    /// from the one reported in the body
    ///
    /// Useful when proxies must see e.g. 200 while the client reads the
    /// logical status from the envelope.
    pub fn reject_with_transport(
        &self,
        transport: impl Into<Status>,
        mut rejection: Rejection,
    ) -> Result<bool, R::Error> {
        let Some(res) = self.open("reject") else {
            return Ok(false);
        };
        rejection.status = rejection.status.or(Status::INTERNAL_SERVER_ERROR);
        let transport = transport.into().or(Status::INTERNAL_SERVER_ERROR);
        res.send_json(&transport, &rejection.to_value())?;
        Ok(true)
    }

    /// Send a bare status response; an unset status becomes 500
    pub fn error(&self, status: impl Into<Status>) -> Result<bool, R::Error> {
        let Some(res) = self.open("error") else {
            return Ok(false);
        };
        res.send_status(&status.into().or(Status::INTERNAL_SERVER_ERROR))?;
        Ok(true)
    }

    fn open(&self, operation: &str) -> Option<&'a R> {
        if self.proceed() {
            self.res
        } else {
            logger::log_debug(&format!("[Guard] {operation} skipped: response already sent"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::convert::Infallible;

    /// One call recorded by `RecordingResponder`
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Emission {
        Json(Status, Value),
        Bare(Status),
    }

    /// Responder double that records emissions and flips its flag on send
    pub struct RecordingResponder {
        pub headers_sent: Cell<Option<bool>>,
        pub emissions: RefCell<Vec<Emission>>,
    }

    impl RecordingResponder {
        pub fn with_flag(headers_sent: Option<bool>) -> Self {
            Self {
                headers_sent: Cell::new(headers_sent),
                emissions: RefCell::new(Vec::new()),
            }
        }

        pub fn open() -> Self {
            Self::with_flag(Some(false))
        }

        fn record(&self, emission: Emission) {
            self.emissions.borrow_mut().push(emission);
            self.headers_sent.set(Some(true));
        }
    }

    impl Responder for RecordingResponder {
        type Error = Infallible;

        fn headers_sent(&self) -> Option<bool> {
            self.headers_sent.get()
        }

        fn send_json(&self, status: &Status, body: &Value) -> Result<(), Infallible> {
            self.record(Emission::Json(status.clone(), body.clone()));
            Ok(())
        }

        fn send_status(&self, status: &Status) -> Result<(), Infallible> {
            self.record(Emission::Bare(status.clone()));
            Ok(())
        }
    }

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_proceed_follows_flag() {
        assert!(!ResponseGuard::new(&RecordingResponder::with_flag(Some(true))).proceed());
        assert!(ResponseGuard::new(&RecordingResponder::open()).proceed());
        assert!(ResponseGuard::new(&RecordingResponder::open()).has_not_responded());
    }

    #[test]
    fn test_unknown_flag_counts_as_sent() {
        let res = RecordingResponder::with_flag(None);
        let guard = ResponseGuard::new(&res);
        assert!(!guard.proceed());
        assert_eq!(guard.accept(Map::new()), Ok(false));
        assert!(res.emissions.borrow().is_empty());

        let detached = ResponseGuard::<RecordingResponder>::detached();
        assert!(!detached.proceed());
        assert_eq!(detached.reject(Rejection::default()), Ok(false));
        assert_eq!(detached.error(500), Ok(false));
    }

    #[test]
    fn test_closed_handle_declines_everything() {
        let res = RecordingResponder::with_flag(Some(true));
        let guard = ResponseGuard::new(&res);
        assert_eq!(guard.accept(Map::new()), Ok(false));
        assert_eq!(guard.reject(Rejection::default()), Ok(false));
        assert_eq!(guard.error(500), Ok(false));
        assert!(res.emissions.borrow().is_empty());
    }

    #[test]
    fn test_accept_defaults() {
        let res = RecordingResponder::open();
        assert_eq!(ResponseGuard::new(&res).accept(Map::new()), Ok(true));
        assert_eq!(
            res.emissions.borrow().as_slice(),
            &[Emission::Json(Status::Code(200), json!({ "ok": true }))]
        );
    }

    #[test]
    fn test_accept_keeps_body_props() {
        let res = RecordingResponder::open();
        let body = map(json!({ "foo": "bar", "bar": "foo" }));
        assert_eq!(ResponseGuard::new(&res).accept_with_status(body, 201), Ok(true));
        assert_eq!(
            res.emissions.borrow().as_slice(),
            &[Emission::Json(
                Status::Code(201),
                json!({ "ok": true, "foo": "bar", "bar": "foo" })
            )]
        );
    }

    #[test]
    fn test_reject_defaults() {
        let res = RecordingResponder::open();
        assert_eq!(ResponseGuard::new(&res).reject(Rejection::default()), Ok(true));
        assert_eq!(
            res.emissions.borrow().as_slice(),
            &[Emission::Json(
                Status::Code(500),
                json!({ "ok": false, "message": "", "status": 500, "trace": {} })
            )]
        );
    }

    #[test]
    fn test_reject_with_arguments() {
        let res = RecordingResponder::open();
        let rejection = Rejection::new("Bad request")
            .status(900)
            .trace_entry("route", "/x");
        assert_eq!(ResponseGuard::new(&res).reject(rejection), Ok(true));
        assert_eq!(
            res.emissions.borrow().as_slice(),
            &[Emission::Json(
                Status::Code(900),
                json!({ "ok": false, "message": "Bad request", "status": 900, "trace": { "route": "/x" } })
            )]
        );
    }

    #[test]
    fn test_reject_transport_can_diverge() {
        let res = RecordingResponder::open();
        let rejection = Rejection::new("Wrong password").status(401);
        assert_eq!(
            ResponseGuard::new(&res).reject_with_transport(200, rejection),
            Ok(true)
        );
        let emissions = res.emissions.borrow();
        let Emission::Json(status, body) = &emissions[0] else {
            panic!("expected a JSON emission, got {emissions:?}");
        };
        assert_eq!(status, &Status::Code(200));
        assert_eq!(body["status"], json!(401));
    }

    #[test]
    fn test_error_codes() {
        let res = RecordingResponder::open();
        assert_eq!(ResponseGuard::new(&res).error(Status::default()), Ok(true));
        assert_eq!(res.emissions.borrow().as_slice(), &[Emission::Bare(Status::Code(500))]);

        let res = RecordingResponder::open();
        assert_eq!(ResponseGuard::new(&res).error(999), Ok(true));
        assert_eq!(res.emissions.borrow().as_slice(), &[Emission::Bare(Status::Code(999))]);
    }

    #[test]
    fn test_zero_status_falls_back_to_default() {
        let res = RecordingResponder::open();
        assert_eq!(ResponseGuard::new(&res).error(0), Ok(true));
        assert_eq!(res.emissions.borrow().as_slice(), &[Emission::Bare(Status::Code(500))]);

        let res = RecordingResponder::open();
        assert_eq!(ResponseGuard::new(&res).accept_with_status(Map::new(), 0), Ok(true));
        assert_eq!(
            res.emissions.borrow().as_slice(),
            &[Emission::Json(Status::Code(200), json!({ "ok": true }))]
        );
    }

    #[test]
    fn test_blank_reject_status_becomes_500() {
        let res = RecordingResponder::open();
        let rejection = Rejection::new("x").status("");
        assert_eq!(ResponseGuard::new(&res).reject(rejection), Ok(true));
        assert_eq!(
            res.emissions.borrow().as_slice(),
            &[Emission::Json(
                Status::Code(500),
                json!({ "ok": false, "message": "x", "status": 500, "trace": {} })
            )]
        );

        let res = RecordingResponder::open();
        let rejection = Rejection::new("y").status(0);
        assert_eq!(
            ResponseGuard::new(&res).reject_with_transport("  ", rejection),
            Ok(true)
        );
        let emissions = res.emissions.borrow();
        let Emission::Json(status, body) = &emissions[0] else {
            panic!("expected a JSON emission, got {emissions:?}");
        };
        assert_eq!(status, &Status::Code(500));
        assert_eq!(body["status"], json!(500));
    }

    #[test]
    fn test_only_first_operation_emits() {
        let res = RecordingResponder::open();
        let guard = ResponseGuard::new(&res);
        assert_eq!(guard.error(503), Ok(true));
        assert_eq!(guard.accept(Map::new()), Ok(false));
        assert_eq!(guard.reject(Rejection::default()), Ok(false));
        assert_eq!(guard.error(503), Ok(false));
        assert_eq!(res.emissions.borrow().len(), 1);
        assert_eq!(res.headers_sent(), Some(true));
    }

    #[test]
    fn test_repeated_call_equals_single_call() {
        let once = RecordingResponder::open();
        ResponseGuard::new(&once).accept(Map::new()).unwrap();

        let twice = RecordingResponder::open();
        let guard = ResponseGuard::new(&twice);
        guard.accept(Map::new()).unwrap();
        guard.accept(Map::new()).unwrap();

        assert_eq!(*once.emissions.borrow(), *twice.emissions.borrow());
        assert_eq!(once.headers_sent(), twice.headers_sent());
    }

    #[test]
    fn test_second_guard_sees_first_guard_response() {
        let res = RecordingResponder::open();
        let first = ResponseGuard::new(&res);
        let second = ResponseGuard::new(&res);
        assert!(second.proceed());
        assert_eq!(first.accept(Map::new()), Ok(true));
        assert!(!second.proceed());
        assert_eq!(second.reject(Rejection::default()), Ok(false));
        assert_eq!(res.emissions.borrow().len(), 1);
    }

    #[test]
    fn test_external_close_is_observed() {
        let res = RecordingResponder::open();
        let guard = ResponseGuard::new(&res);
        assert!(guard.proceed());
        // response written by someone else after the guard was built
        res.headers_sent.set(Some(true));
        assert_eq!(guard.error(500), Ok(false));
        assert!(res.emissions.borrow().is_empty());
    }
}
