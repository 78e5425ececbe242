use serde_json::Value;
use tracing::debug;

use super::CatalogFetcher;
use crate::error::{FsError, Result};

/// One page of a paginated collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Cursor of the following page; `None` on the last page.
    pub next: Option<String>,
}

impl Page {
    pub fn new(items: Vec<Value>, next: Option<String>) -> Self {
        Self { items, next }
    }

    /// Parses a paging object (`{"items": [...], "next": ...}`).
    ///
    /// Cursor-paged collections come wrapped in a single-field object (the
    /// followed-artists endpoint answers `{"artists": {...}}`); the wrapper is
    /// unwrapped.
    pub fn from_value(value: &Value) -> Result<Self> {
        let paging = match value.get("items") {
            Some(_) => value,
            None => value
                .as_object()
                .filter(|object| object.len() == 1)
                .and_then(|object| object.values().next())
                .filter(|inner| inner.get("items").is_some())
                .ok_or_else(|| FsError::remote("malformed page: no items"))?,
        };

        let items = paging["items"]
            .as_array()
            .cloned()
            .ok_or_else(|| FsError::remote("malformed page: items is not an array"))?;
        let next = paging
            .get("next")
            .and_then(Value::as_str)
            .filter(|next| !next.is_empty())
            .map(str::to_string);

        Ok(Self { items, next })
    }
}

/// Collects `first` and every page after it, in order.
pub async fn drain_pages(fetcher: &dyn CatalogFetcher, first: Page) -> Result<Vec<Value>> {
    let mut items = first.items;
    let mut next = first.next;
    let mut pages = 1;

    while let Some(cursor) = next {
        let page = fetcher.fetch_page(&cursor).await?;
        items.extend(page.items);
        next = page.next;
        pages += 1;
    }

    debug!("Drained {} pages ({} items)", pages, items.len());
    Ok(items)
}

/// Collects a whole collection starting from a cursor.
pub async fn fetch_all_pages(fetcher: &dyn CatalogFetcher, cursor: &str) -> Result<Vec<Value>> {
    let first = fetcher.fetch_page(cursor).await?;
    drain_pages(fetcher, first).await
}
