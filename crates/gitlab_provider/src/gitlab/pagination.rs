//! Offset pagination over GitLab list endpoints.
//!
//! GitLab reports the following page number in the `X-Next-Page` header and
//! leaves it empty on the last page. Pages are fetched strictly in sequence
//! and appended in vendor order.

use std::future::Future;

use crate::errors::Result;
use crate::http::HttpHeaders;
use crate::http::header_get;

/// Default page size for list requests (GitLab's maximum).
pub const PAGE_SIZE: u32 = 100;

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Next page number, or `None` on the last page.
    pub next_page: Option<u32>,
}

/// Read the next page number from response headers.
pub fn next_page(headers: &HttpHeaders) -> Option<u32> {
    header_get(headers, "x-next-page")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u32>().ok())
}

/// Append `page` and `per_page` query parameters to an API path.
pub fn with_page(path: &str, page: u32, per_page: u32) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}page={page}&per_page={per_page}")
}

/// Fetch every page, starting at page 1, until the vendor reports no next page.
///
/// Any page's error aborts the whole listing.
pub async fn collect_all<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut all = Vec::new();
    let mut page = 1u32;

    loop {
        let Page { items, next_page } = fetch_page(page).await?;
        tracing::trace!(page, count = items.len(), "Fetched page");
        all.extend(items);

        match next_page {
            // A server echoing the same page would otherwise loop forever.
            Some(next) if next > page => page = next,
            _ => break,
        }
    }

    Ok(all)
}
