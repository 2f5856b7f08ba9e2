//! Pull-based item stream trait
//!
//! Dyn-compatible (boxed-future returns) so paginators of different concrete
//! types can sit behind `Box<dyn ItemStream<T>>` in a merge. The sequence
//! contract is the paginators': lazy, finite, forward-only, non-restartable.

use std::future::Future;
use std::pin::Pin;

use common::FetchError;

/// Future returned by one `next_item` pull.
pub type ItemFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Option<T>, FetchError>> + Send + 'a>>;

/// A lazy sequence of items that may fail while producing the next one.
///
/// `Ok(None)` is terminal; callers must not pull again after it.
pub trait ItemStream<T>: Send {
    /// Pull the next item.
    fn next_item(&mut self) -> ItemFuture<'_, T>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted stream for merge tests: yields items, then optionally fails.
    pub(crate) struct ScriptedStream<T> {
        items: VecDeque<T>,
        trailing_error: Option<FetchError>,
    }

    impl<T> ScriptedStream<T> {
        pub(crate) fn new(items: Vec<T>) -> Self {
            Self {
                items: items.into(),
                trailing_error: None,
            }
        }

        pub(crate) fn failing_after(items: Vec<T>, error: FetchError) -> Self {
            Self {
                items: items.into(),
                trailing_error: Some(error),
            }
        }

        /// Fails on the very first pull.
        pub(crate) fn broken(error: FetchError) -> Self {
            Self::failing_after(Vec::new(), error)
        }
    }

    impl<T: Send> ItemStream<T> for ScriptedStream<T> {
        fn next_item(&mut self) -> ItemFuture<'_, T> {
            let next = match self.items.pop_front() {
                Some(item) => Ok(Some(item)),
                None => match self.trailing_error.take() {
                    Some(err) => Err(err),
                    None => Ok(None),
                },
            };
            Box::pin(std::future::ready(next))
        }
    }
}
