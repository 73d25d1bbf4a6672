//! Success wrapper with memoized body views

use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{DomainError, ResponseError};
use crate::pagination::Pagination;
use crate::raw::{Body, RawResponse};

/// A classified HTTP exchange.
///
/// Status and headers are fixed at construction. The body is read once, on
/// first access to [`buffer`](Self::buffer), [`json`](Self::json) or
/// [`text`](Self::text); every view is memoized afterwards.
pub struct ClassifiedResponse {
    status: StatusCode,
    headers: HeaderMap,
    pending: Mutex<Option<Body>>,
    buffer: OnceCell<Bytes>,
    json: OnceCell<Value>,
    text: OnceCell<String>,
}

impl ClassifiedResponse {
    pub(crate) fn from_raw(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            pending: Mutex::new(Some(raw.body)),
            buffer: OnceCell::new(),
            json: OnceCell::new(),
            text: OnceCell::new(),
        }
    }

    /// HTTP status
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Canonical reason phrase for the status
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or_default()
    }

    /// `true` for 2xx and 3xx statuses
    pub fn ok(&self) -> bool {
        self.status.is_success() || self.status.is_redirection()
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn header(&self, name: http::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    /// `Content-Encoding` header
    pub fn content_encoding(&self) -> Option<&str> {
        self.header(CONTENT_ENCODING)
    }

    /// `Content-Length` header
    pub fn content_length(&self) -> Option<u64> {
        self.header(CONTENT_LENGTH).and_then(|v| v.parse().ok())
    }

    /// Content type starts with `application/json`
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    /// Content type starts with `text/`
    pub fn is_text(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.starts_with("text/"))
    }

    /// Raw body bytes.
    pub async fn buffer(&self) -> Result<&Bytes, ResponseError> {
        self.buffer
            .get_or_try_init(|| async {
                let body = self.pending.lock().take();
                match body {
                    Some(Body::Buffered(bytes)) => Ok(bytes),
                    Some(Body::Pending(read)) => read.await,
                    None => Err(ResponseError::BodyConsumed),
                }
            })
            .await
    }

    /// Body parsed as JSON, or `None` when the content type is not JSON.
    pub async fn json(&self) -> Result<Option<&Value>, ResponseError> {
        if !self.is_json() {
            return Ok(None);
        }
        let value = self
            .json
            .get_or_try_init(|| async {
                let bytes = self.buffer().await?;
                Ok::<_, ResponseError>(serde_json::from_slice(bytes)?)
            })
            .await?;
        Ok(Some(value))
    }

    /// Body as text, or `None` when the content type is not `text/*`.
    pub async fn text(&self) -> Result<Option<&str>, ResponseError> {
        if !self.is_text() {
            return Ok(None);
        }
        let text = self
            .text
            .get_or_try_init(|| async {
                let bytes = self.buffer().await?;
                Ok::<_, ResponseError>(String::from_utf8_lossy(bytes).into_owned())
            })
            .await?;
        Ok(Some(text.as_str()))
    }

    /// Deserialize the body as JSON regardless of the declared content type.
    pub async fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ResponseError> {
        let bytes = self.buffer().await?;
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Pagination cursor from a JSON list body; empty when the body is not JSON.
    pub async fn pagination(&self) -> Pagination {
        match self.json().await {
            Ok(Some(payload)) => Pagination::from_payload(payload),
            _ => Pagination::default(),
        }
    }

    pub(crate) async fn into_domain_error(self) -> DomainError {
        let body = match self.buffer().await {
            Ok(bytes) => bytes.clone(),
            Err(err) => {
                tracing::warn!(
                    status = self.status.as_u16(),
                    error = %err,
                    "failed to read error body"
                );
                Bytes::new()
            }
        };
        DomainError::new(self.status, &body)
    }
}

impl std::fmt::Debug for ClassifiedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifiedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("buffered", &self.buffer.initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn response(content_type: &str, body: &'static str) -> ClassifiedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        ClassifiedResponse::from_raw(RawResponse::new(StatusCode::OK, headers, body))
    }

    #[tokio::test]
    async fn test_json_view_only_for_json_content() {
        let res = response("text/plain; charset=utf-8", r#"{"a":1}"#);

        assert_eq!(res.json().await.unwrap(), None);
        assert_eq!(res.text().await.unwrap(), Some(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn test_views_share_one_body_read() {
        let reads = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = reads.clone();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let raw = RawResponse::streaming(StatusCode::OK, headers, async move {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Bytes::from_static(br#"{"total":1}"#))
        });
        let res = ClassifiedResponse::from_raw(raw);

        assert_eq!(res.json().await.unwrap().unwrap()["total"], 1);
        assert_eq!(res.json().await.unwrap().unwrap()["total"], 1);
        assert_eq!(res.buffer().await.unwrap().len(), 11);
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let res = response("application/json", "not json");
        assert!(matches!(res.json().await, Err(ResponseError::Json(_))));
    }

    #[test]
    fn test_redirect_counts_as_ok() {
        let res = ClassifiedResponse::from_raw(RawResponse::new(
            StatusCode::NOT_MODIFIED,
            HeaderMap::new(),
            "",
        ));
        assert!(res.ok());
        assert_eq!(res.status_text(), "Not Modified");
    }
}
