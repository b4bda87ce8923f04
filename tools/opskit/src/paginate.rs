//! The paginate module owns draining list/describe APIs that hand back a continuation token.

use async_trait::async_trait;

/// One response from a paginated API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Token to pass to the next request; `None` when this was the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }
}

/// Something that can fetch one page of a listing given the previous page's token.
#[async_trait]
pub trait PageSource {
    type Item: Send;
    type Error;

    async fn fetch_page(
        &self,
        next_token: Option<String>,
    ) -> std::result::Result<Page<Self::Item>, Self::Error>;
}

/// Requests pages from `source` until one comes back without a continuation token, keeping the
/// items for which `keep` returns true.  Each page is filtered as it arrives; the kept items are
/// returned in page order.  The first failed request ends the listing with its error.
pub async fn collect_pages<S, F>(
    source: &S,
    mut keep: F,
) -> std::result::Result<Vec<S::Item>, S::Error>
where
    S: PageSource + Sync,
    F: FnMut(&S::Item) -> bool + Send,
{
    let mut kept = Vec::new();
    let mut next_token = None;
    loop {
        let page = source.fetch_page(next_token.take()).await?;
        kept.extend(page.items.into_iter().filter(|item| keep(item)));

        // Some APIs hand back an empty string rather than omitting the token on the last page.
        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => return Ok(kept),
        }
    }
}
