use std::future::Future;

use crate::error::ResponseError;
use crate::raw::RawResponse;
use crate::response::ClassifiedResponse;

/// Await a pending exchange and classify it.
///
/// Transport failures become [`ResponseError::Transport`]. A completed
/// exchange with a non-ok status becomes [`ResponseError::Http`] carrying the
/// status, its [`ErrorKind`](crate::ErrorKind), the body text and, when the
/// body parses, its JSON.
///
/// ```
/// use http::{HeaderMap, StatusCode};
/// use jobserv_response::{classify, ErrorKind, RawResponse, ResponseError};
///
/// # async fn example() {
/// let raw = RawResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), "missing");
/// let err = classify(async { Ok::<_, ResponseError>(raw) }).await.unwrap_err();
///
/// assert_eq!(err.kind(), Some(ErrorKind::NotFound));
/// # }
/// ```
pub async fn classify<F, R, E>(exchange: F) -> Result<ClassifiedResponse, ResponseError>
where
    F: Future<Output = Result<R, E>>,
    R: Into<RawResponse>,
    E: Into<ResponseError>,
{
    let raw: RawResponse = exchange.await.map_err(Into::into)?.into();
    let response = ClassifiedResponse::from_raw(raw);

    if response.ok() {
        return Ok(response);
    }

    let err = response.into_domain_error().await;
    tracing::debug!(
        status = err.status,
        kind = err.kind.map_or("unmapped", crate::ErrorKind::as_str),
        "request failed"
    );
    Err(err.into())
}
