//! Page-number pagination
//!
//! The cursor is an integer page number starting at 1. Each `next_page`
//! equivalent calls the supplied fetch closure (which should go through the
//! dispatcher) and advances the page number unless the short-page condition
//! fired.

use std::future::Future;

use common::{FetchError, FetchResult};
use tracing::debug;

use crate::buffer::PageBuffer;
use crate::stream::{ItemFuture, ItemStream};

/// Lazy sequence over a page-numbered resource.
pub struct PagedPaginator<T, F> {
    fetch: F,
    page: u64,
    buffer: PageBuffer<T>,
}

impl<T, F, Fut> PagedPaginator<T, F>
where
    T: Send,
    F: FnMut(u64) -> Fut + Send,
    Fut: Future<Output = FetchResult<T>> + Send,
{
    /// Create a paginator starting at page 1.
    ///
    /// `fetch` performs exactly one logical request for the given page
    /// number and reports failures per the `FetchError` taxonomy.
    pub fn new(page_size: usize, limit: Option<usize>, fetch: F) -> Self {
        Self {
            fetch,
            page: 1,
            buffer: PageBuffer::new(page_size, limit),
        }
    }

    /// The page number the next fetch would request.
    pub fn current_page(&self) -> u64 {
        self.page
    }

    /// Pull the next item, fetching a page when the buffer runs dry.
    ///
    /// `Ok(None)` means the sequence ended (short page) or the item limit
    /// was reached. A `Fatal` error is terminal: the paginator stops and
    /// never fetches again.
    pub async fn next(&mut self) -> Result<Option<T>, FetchError> {
        loop {
            if let Some(item) = self.buffer.pop() {
                return Ok(Some(item));
            }
            if !self.buffer.needs_fetch() {
                return Ok(None);
            }
            let page = match (self.fetch)(self.page).await {
                Ok(page) => page,
                Err(err) => {
                    if err.is_fatal() {
                        self.buffer.mark_exhausted();
                    }
                    return Err(err);
                }
            };
            debug!(page = self.page, items = page.len(), "fetched page");
            let short = page.len() < self.buffer.page_size();
            self.buffer.refill(page);
            if !short {
                self.page += 1;
            }
        }
    }

    /// Drain the remainder of the sequence into a vector.
    pub async fn flatten(mut self) -> Result<Vec<T>, FetchError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

impl<T, F, Fut> ItemStream<T> for PagedPaginator<T, F>
where
    T: Send,
    F: FnMut(u64) -> Fut + Send,
    Fut: Future<Output = FetchResult<T>> + Send + 'static,
{
    fn next_item(&mut self) -> ItemFuture<'_, T> {
        Box::pin(self.next())
    }
}
