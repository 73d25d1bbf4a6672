//! Pagination cursor for list-style responses

use serde::Serialize;
use serde_json::Value;

/// Page cursor derived from a list response body.
///
/// All fields are `None` when the body carried no pagination data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Total number of items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Number of pages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u64>,
    /// Current page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    /// Next page, `None` past the last page
    pub next: Option<u64>,
}

impl Pagination {
    /// Read the cursor from `{ data: { total, limit, pages, page } }`, or
    /// from the same fields at the top level when `data` is absent.
    pub fn from_payload(payload: &Value) -> Self {
        // builds and devices APIs disagree on where the cursor lives
        let data = payload
            .get("data")
            .filter(|data| data.is_object())
            .unwrap_or(payload);

        let field = |name: &str| data.get(name).and_then(Value::as_u64);
        let page = field("page");
        let pages = field("pages");

        let next = match (page, pages) {
            (Some(page), Some(pages)) if page < pages => Some(page + 1),
            _ => None,
        };

        Self {
            total: field("total"),
            limit: field("limit"),
            pages,
            current: page,
            next,
        }
    }

    /// `true` when no cursor field was found.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
