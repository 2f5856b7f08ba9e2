//! Buffered pagination core
//!
//! State shared by the concrete paginators: an item buffer refilled one page
//! at a time, a short-page exhaustion flag, and an optional remaining-item
//! budget. The budget caps what consumers pull, not what fetches return —
//! a refill may overshoot the limit and the surplus is simply never yielded.

use std::collections::VecDeque;

/// Buffer between page fetches and item consumers.
#[derive(Debug)]
pub struct PageBuffer<T> {
    items: VecDeque<T>,
    page_size: usize,
    exhausted: bool,
    remaining: Option<usize>,
}

impl<T> PageBuffer<T> {
    /// Create a buffer expecting `page_size` items per full page.
    pub fn new(page_size: usize, limit: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            page_size,
            exhausted: false,
            remaining: limit,
        }
    }

    /// Expected items per full page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether a short page (or a terminal error) ended the sequence.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether the item budget is spent.
    pub fn limit_reached(&self) -> bool {
        matches!(self.remaining, Some(0))
    }

    /// Whether the consumer needs another `next_page` call to make progress.
    pub fn needs_fetch(&self) -> bool {
        self.items.is_empty() && !self.exhausted && !self.limit_reached()
    }

    /// Pull one buffered item, counting it against the budget.
    pub fn pop(&mut self) -> Option<T> {
        if self.limit_reached() {
            return None;
        }
        let item = self.items.pop_front()?;
        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }
        Some(item)
    }

    /// Accept one fetched page. A page shorter than `page_size` marks the
    /// sequence exhausted after its contents are yielded.
    pub fn refill(&mut self, page: Vec<T>) {
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        self.items.extend(page);
    }

    /// Force exhaustion (terminal fetch error).
    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }
}
