//! Error types for classified HTTP exchanges
//!
//! - [`ErrorKind`]: stable name for a well-known failure status
//! - [`DomainError`]: a completed exchange whose status was not ok
//! - [`ResponseError`]: everything that can go wrong while classifying

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Well-known failure categories, keyed by HTTP status code.
///
/// Statuses outside this table classify to `None`; the numeric status on
/// [`DomainError`] is always populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 405
    NotAllowed,
    /// 406
    NotAcceptable,
    /// 408
    RequestTimeout,
    /// 410
    Gone,
    /// 500
    ServerError,
    /// 501
    NotImplemented,
    /// 503
    ServiceUnavailable,
    /// 504
    Timeout,
}

impl ErrorKind {
    /// Look up the kind for a status code.
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            405 => Some(Self::NotAllowed),
            406 => Some(Self::NotAcceptable),
            408 => Some(Self::RequestTimeout),
            410 => Some(Self::Gone),
            500 => Some(Self::ServerError),
            501 => Some(Self::NotImplemented),
            503 => Some(Self::ServiceUnavailable),
            504 => Some(Self::Timeout),
            _ => None,
        }
    }

    /// Wire name of the kind (`"not_found"`, `"server_error"`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::NotAllowed => "not_allowed",
            Self::NotAcceptable => "not_acceptable",
            Self::RequestTimeout => "request_timeout",
            Self::Gone => "gone",
            Self::ServerError => "server_error",
            Self::NotImplemented => "not_implemented",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed exchange whose status was not ok.
///
/// `text` always holds the body as (lossy) UTF-8. `json` is only set when
/// the body parsed as JSON.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{status} {status_text} ({})", .kind.map_or("unmapped", ErrorKind::as_str))]
pub struct DomainError {
    /// Numeric HTTP status
    pub status: u16,
    /// Canonical reason phrase, empty when the status has none
    pub status_text: String,
    /// Kind from the fixed status table, `None` for unmapped statuses
    pub kind: Option<ErrorKind>,
    /// Raw body text
    pub text: String,
    /// Raw body JSON, when parseable
    pub json: Option<Value>,
}

impl DomainError {
    /// Build an error for `status` with the given body.
    pub fn new(status: http::StatusCode, body: &[u8]) -> Self {
        Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            kind: ErrorKind::from_status(status.as_u16()),
            text: String::from_utf8_lossy(body).into_owned(),
            json: serde_json::from_slice(body).ok(),
        }
    }

    /// `true` when the status mapped to `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }
}

/// Failure while performing or classifying an exchange.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The exchange completed with a non-ok status
    #[error(transparent)]
    Http(#[from] DomainError),

    /// The exchange never produced a response (connect, TLS, timeout)
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A previous body read failed and the body is gone
    #[error("response body already consumed")]
    BodyConsumed,

    /// The body was expected to be JSON and was not
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResponseError {
    /// Wrap a transport-level failure.
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }

    /// Wrap a body read failure.
    pub fn body(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Body(err.into())
    }

    /// The domain error, if the exchange completed with a failure status.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status of the failed exchange, if any.
    pub fn status(&self) -> Option<u16> {
        self.domain().map(|err| err.status)
    }

    /// Error kind of the failed exchange, if mapped.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.domain().and_then(|err| err.kind)
    }
}

impl From<reqwest::Error> for ResponseError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<std::convert::Infallible> for ResponseError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}
