//! JobServ Response - uniform classification of HTTP exchanges
//!
//! Every component that talks to a JobServ-style HTTP API passes the
//! pending exchange through [`classify`]. The result is either a
//! [`ClassifiedResponse`] with memoized body views, or a [`ResponseError`]
//! whose HTTP variant carries a [`DomainError`] with a stable
//! [`ErrorKind`] looked up from the status code.
//!
//! # Example
//!
//! ```no_run
//! use jobserv_response::{classify, ResponseError};
//!
//! # async fn example() -> Result<(), ResponseError> {
//! let client = reqwest::Client::new();
//! let response = classify(client.get("https://api.example.com/projects/").send()).await?;
//!
//! let page = response.pagination().await;
//! println!("next page: {:?}", page.next);
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod classify;
mod error;
mod pagination;
mod raw;
mod response;

pub use classify::classify;
pub use error::{DomainError, ErrorKind, ResponseError};
pub use pagination::Pagination;
pub use raw::{BodyFuture, RawResponse};
pub use response::ClassifiedResponse;

/// Commonly used types
pub mod prelude {
    pub use crate::{
        ClassifiedResponse, DomainError, ErrorKind, Pagination, RawResponse, ResponseError,
        classify,
    };
}
