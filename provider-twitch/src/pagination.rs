//! Cursor pagination
//!
//! Drains a Helix collection endpoint into one `Vec`. Pages are requested
//! strictly one after another: each request needs the cursor of the
//! previous response.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::HelixRequest;
use crate::error::{Result, TwitchError};
use crate::types::HelixPage;

/// Something that can execute one page request.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page<T>(&self, request: &HelixRequest) -> Result<HelixPage<T>>
    where
        T: DeserializeOwned + Send;
}

/// Issue `initial`, then follow the cursor until a page comes back without
/// one. Items keep page order, then in-page order.
///
/// All-or-nothing: the first failing page aborts the whole fetch and no
/// partial result is returned. Nothing is retried.
///
/// # Errors
///
/// - whatever the source returns for a page
/// - [`TwitchError::PageLimitExceeded`] when `max_pages` pages were read and
///   the last one still had a cursor
pub async fn fetch_all<S, T>(source: &S, initial: HelixRequest, max_pages: usize) -> Result<Vec<T>>
where
    S: PageSource,
    T: DeserializeOwned + Send,
{
    let max_pages = max_pages.max(1);
    let mut items = Vec::new();
    let mut request = initial;

    for page_number in 1..=max_pages {
        let page: HelixPage<T> = source.fetch_page(&request).await?;
        let next = page.cursor().map(str::to_string);
        items.extend(page.data);

        match next {
            Some(cursor) => {
                debug!(path = request.path(), page_number, "Following cursor");
                request = request.with_cursor(&cursor);
            }
            None => {
                debug!(path = request.path(), pages = page_number, items = items.len(), "Pagination complete");
                return Ok(items);
            }
        }
    }

    warn!(path = request.path(), max_pages, "Page ceiling reached with more pages left");
    Err(TwitchError::PageLimitExceeded { max_pages })
}
