//! End-id cursor pagination
//!
//! The cursor is an opaque end id: the fetch closure returns items strictly
//! before it, most recent first, and 0 conventionally means "most recent".
//! The cursor tracks the id of the last *yielded* item (not the last fetched
//! one), so a cursor captured after k items and fed to a fresh paginator
//! reproduces the exact continuation of the sequence — provided the
//! upstream ordering is stable between the two sessions.

use std::future::Future;

use common::{FetchError, FetchResult};
use tracing::debug;

use crate::buffer::PageBuffer;
use crate::stream::{ItemFuture, ItemStream};

/// Lazy sequence over a cursor-based resource.
pub struct CursorPaginator<T, F, K> {
    fetch: F,
    id_of: K,
    cursor: u64,
    buffer: PageBuffer<T>,
}

impl<T, F, Fut, K> CursorPaginator<T, F, K>
where
    T: Send,
    F: FnMut(u64) -> Fut + Send,
    Fut: Future<Output = FetchResult<T>> + Send,
    K: Fn(&T) -> u64 + Send,
{
    /// Create a paginator starting at `cursor` (0 = most recent).
    ///
    /// `id_of` extracts the item id the upstream pages by; `fetch` requests
    /// one page of items before the given end id.
    pub fn new(page_size: usize, limit: Option<usize>, cursor: u64, id_of: K, fetch: F) -> Self {
        Self {
            fetch,
            id_of,
            cursor,
            buffer: PageBuffer::new(page_size, limit),
        }
    }

    /// The resume point: id of the last yielded item, or the starting value
    /// if nothing has been yielded yet.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Pull the next item, fetching a page when the buffer runs dry.
    ///
    /// Same termination rules as the paged variant: short page or item
    /// limit ends the sequence, a `Fatal` error is terminal.
    pub async fn next(&mut self) -> Result<Option<T>, FetchError> {
        loop {
            if let Some(item) = self.buffer.pop() {
                self.cursor = (self.id_of)(&item);
                return Ok(Some(item));
            }
            if !self.buffer.needs_fetch() {
                return Ok(None);
            }
            let page = match (self.fetch)(self.cursor).await {
                Ok(page) => page,
                Err(err) => {
                    if err.is_fatal() {
                        self.buffer.mark_exhausted();
                    }
                    return Err(err);
                }
            };
            debug!(cursor = self.cursor, items = page.len(), "fetched page");
            self.buffer.refill(page);
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

impl<T, F, Fut, K> ItemStream<T> for CursorPaginator<T, F, K>
where
    T: Send,
    F: FnMut(u64) -> Fut + Send,
    Fut: Future<Output = FetchResult<T>> + Send + 'static,
    K: Fn(&T) -> u64 + Send,
{
    fn next_item(&mut self) -> ItemFuture<'_, T> {
        Box::pin(self.next())
    }
}
