//! Transport-agnostic response input

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::future::Future;
use std::pin::Pin;

use crate::error::ResponseError;

/// Deferred body read supplied by a transport.
pub type BodyFuture = Pin<Box<dyn Future<Output = Result<Bytes, ResponseError>> + Send>>;

pub(crate) enum Body {
    Buffered(Bytes),
    Pending(BodyFuture),
}

/// A completed HTTP exchange as handed over by a transport.
///
/// The body is either already buffered or still pending; either way it is
/// read at most once by [`ClassifiedResponse`](crate::ClassifiedResponse).
pub struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
}

impl RawResponse {
    /// Response with a fully buffered body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: Body::Buffered(body.into()),
        }
    }

    /// Response whose body is read lazily from `body`.
    pub fn streaming<F>(status: StatusCode, headers: HeaderMap, body: F) -> Self
    where
        F: Future<Output = Result<Bytes, ResponseError>> + Send + 'static,
    {
        Self {
            status,
            headers,
            body: Body::Pending(Box::pin(body)),
        }
    }

    /// Status of the exchange
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl From<reqwest::Response> for RawResponse {
    fn from(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        Self::streaming(status, headers, async move {
            response.bytes().await.map_err(ResponseError::body)
        })
    }
}
