//! K-way merge across paginated sources
//!
//! Combines several `ItemStream` sources sharing an ordering key into one
//! globally ordered sequence. Two execution modes:
//!
//! - streaming: heap-based lazy merge, one buffered item per source. Assumes
//!   each source is internally monotone in the key (most feeds are emitted
//!   newest-first); the merge does not verify this, and a violating source
//!   makes the output only approximately ordered.
//! - eager: every source drained concurrently, then one full sort. Exact
//!   global order even if a source momentarily violates page-local order,
//!   at the cost of buffering everything.
//!
//! The source insertion index is the tie-break on equal keys, which makes
//! the output deterministic regardless of prefetch completion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use common::FetchError;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::stream::{ItemFuture, ItemStream};

/// Totally ordered merge key, e.g. an epoch-millisecond timestamp.
pub type MergeKey = i64;

/// Output ordering of the merged sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Heap entry: the buffered head of one source.
struct HeapEntry<T> {
    key: MergeKey,
    source: usize,
    item: T,
    direction: Direction,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest entry. Equal keys pop the earlier
        // inserted source first, so ties are deterministic.
        let by_key = match self.direction {
            Direction::Descending => self.key.cmp(&other.key),
            Direction::Ascending => other.key.cmp(&self.key),
        };
        by_key.then_with(|| other.source.cmp(&self.source))
    }
}

/// A set of sources to merge by a shared key.
pub struct MergedPaginator<T> {
    sources: Vec<Box<dyn ItemStream<T>>>,
    key: Arc<dyn Fn(&T) -> MergeKey + Send + Sync>,
    direction: Direction,
    limit: Option<usize>,
}

impl<T: Send + 'static> MergedPaginator<T> {
    /// Create an empty merge with the given key extractor and direction.
    pub fn new(
        direction: Direction,
        key: impl Fn(&T) -> MergeKey + Send + Sync + 'static,
    ) -> Self {
        Self {
            sources: Vec::new(),
            key: Arc::new(key),
            direction,
            limit: None,
        }
    }

    /// Cap the total number of merged items.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a source. Insertion order is the tie-break on equal keys.
    pub fn push(&mut self, source: impl ItemStream<T> + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Add a source, builder style.
    pub fn with_source(mut self, source: impl ItemStream<T> + 'static) -> Self {
        self.push(source);
        self
    }

    /// Start the streaming merge.
    ///
    /// Prefetches the first item of every source concurrently; a source that
    /// fails to produce even its first item is dropped from the merge rather
    /// than aborting it.
    pub async fn into_stream(self) -> MergedStream<T> {
        let count = self.sources.len();
        let mut set = JoinSet::new();
        for (index, mut source) in self.sources.into_iter().enumerate() {
            set.spawn(async move {
                let first = source.next_item().await;
                (index, source, first)
            });
        }

        let mut slots: Vec<Option<Box<dyn ItemStream<T>>>> =
            (0..count).map(|_| None).collect();
        let mut heap = BinaryHeap::new();
        while let Some(joined) = set.join_next().await {
            let Ok((index, source, first)) = joined else {
                warn!("merge prefetch task aborted");
                continue;
            };
            match first {
                Ok(Some(item)) => {
                    heap.push(HeapEntry {
                        key: (self.key)(&item),
                        source: index,
                        item,
                        direction: self.direction,
                    });
                    slots[index] = Some(source);
                }
                Ok(None) => {
                    debug!(source = index, "merge source empty");
                }
                Err(err) => {
                    warn!(source = index, error = %err, "dropping source that failed prefetch");
                }
            }
        }

        MergedStream {
            slots,
            heap,
            key: self.key,
            direction: self.direction,
            remaining: self.limit,
            pending_fatal: None,
        }
    }

    /// Eager mode: drain every source concurrently, sort, truncate.
    ///
    /// Per-source non-fatal failures keep the items collected up to the
    /// failure; a fatal error aborts the whole merge.
    pub async fn collect_eager(self) -> Result<Vec<T>, FetchError> {
        let mut set = JoinSet::new();
        for (index, mut source) in self.sources.into_iter().enumerate() {
            set.spawn(async move {
                let mut items = Vec::new();
                let failure = loop {
                    match source.next_item().await {
                        Ok(Some(item)) => items.push(item),
                        Ok(None) => break None,
                        Err(err) => break Some(err),
                    }
                };
                (index, items, failure)
            });
        }

        let mut tagged: Vec<(MergeKey, usize, T)> = Vec::new();
        while let Some(joined) = set.join_next().await {
            let Ok((index, items, failure)) = joined else {
                warn!("merge drain task aborted");
                continue;
            };
            match failure {
                Some(err) if err.is_fatal() => return Err(err),
                Some(err) => {
                    warn!(source = index, error = %err, "source failed mid-drain, keeping partial items");
                }
                None => {}
            }
            for item in items {
                tagged.push(((self.key)(&item), index, item));
            }
        }

        match self.direction {
            Direction::Descending => {
                tagged.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            }
            Direction::Ascending => {
                tagged.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
            }
        }

        let mut items: Vec<T> = tagged.into_iter().map(|(_, _, item)| item).collect();
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}

/// The streaming half of a merge: pop the head, refill from that source.
pub struct MergedStream<T> {
    slots: Vec<Option<Box<dyn ItemStream<T>>>>,
    heap: BinaryHeap<HeapEntry<T>>,
    key: Arc<dyn Fn(&T) -> MergeKey + Send + Sync>,
    direction: Direction,
    remaining: Option<usize>,
    pending_fatal: Option<FetchError>,
}

impl<T: Send> MergedStream<T> {
    /// Pull the next merged item.
    ///
    /// A source error while refilling drops that source (its already-merged
    /// items stand), except a fatal error, which surfaces on the pull after
    /// the current item and ends the stream.
    pub async fn next(&mut self) -> Result<Option<T>, FetchError> {
        if let Some(err) = self.pending_fatal.take() {
            self.heap.clear();
            return Err(err);
        }
        if matches!(self.remaining, Some(0)) {
            return Ok(None);
        }
        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };

        if let Some(source) = self.slots[entry.source].as_mut() {
            match source.next_item().await {
                Ok(Some(item)) => {
                    self.heap.push(HeapEntry {
                        key: (self.key)(&item),
                        source: entry.source,
                        item,
                        direction: self.direction,
                    });
                }
                Ok(None) => {
                    debug!(source = entry.source, "merge source exhausted");
                    self.slots[entry.source] = None;
                }
                Err(err) if err.is_fatal() => {
                    self.slots[entry.source] = None;
                    self.pending_fatal = Some(err);
                }
                Err(err) => {
                    warn!(source = entry.source, error = %err, "dropping source after error");
                    self.slots[entry.source] = None;
                }
            }
        }

        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }
        Ok(Some(entry.item))
    }

    /// Drain the remainder of the merge into a vector.
    pub async fn flatten(mut self) -> Result<Vec<T>, FetchError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

impl<T: Send> ItemStream<T> for MergedStream<T> {
    fn next_item(&mut self) -> ItemFuture<'_, T> {
        Box::pin(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::PagedPaginator;
    use crate::stream::testing::ScriptedStream;

    fn keyed(direction: Direction) -> MergedPaginator<i64> {
        MergedPaginator::new(direction, |item: &i64| *item)
    }

    #[tokio::test]
    async fn streaming_merges_descending_sources() {
        // [9,5,1], [8,2], [7] with limit 4 interleave to [9,8,7,5].
        let merged = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![9, 5, 1]))
            .with_source(ScriptedStream::new(vec![8, 2]))
            .with_source(ScriptedStream::new(vec![7]))
            .with_limit(4);

        let items = merged.into_stream().await.flatten().await.unwrap();
        assert_eq!(items, vec![9, 8, 7, 5]);
    }

    #[tokio::test]
    async fn streaming_without_limit_merges_everything() {
        // Globally non-increasing, length equals the total across sources.
        let merged = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![9, 5, 1]))
            .with_source(ScriptedStream::new(vec![8, 2]))
            .with_source(ScriptedStream::new(vec![7]));

        let items = merged.into_stream().await.flatten().await.unwrap();
        assert_eq!(items, vec![9, 8, 7, 5, 2, 1]);
        assert!(items.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn eager_matches_streaming_output() {
        let streaming = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![90, 40, 10]))
            .with_source(ScriptedStream::new(vec![80, 50]))
            .with_source(ScriptedStream::new(vec![70, 60, 20]))
            .into_stream()
            .await
            .flatten()
            .await
            .unwrap();

        let eager = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![90, 40, 10]))
            .with_source(ScriptedStream::new(vec![80, 50]))
            .with_source(ScriptedStream::new(vec![70, 60, 20]))
            .collect_eager()
            .await
            .unwrap();

        assert_eq!(streaming, eager);
        assert_eq!(eager, vec![90, 80, 70, 60, 50, 40, 20, 10]);
    }

    #[tokio::test]
    async fn ascending_direction_flips_order() {
        let merged = keyed(Direction::Ascending)
            .with_source(ScriptedStream::new(vec![1, 5, 9]))
            .with_source(ScriptedStream::new(vec![2, 8]));

        let items = merged.into_stream().await.flatten().await.unwrap();
        assert_eq!(items, vec![1, 2, 5, 8, 9]);
    }

    #[tokio::test]
    async fn equal_keys_break_ties_by_source_order() {
        #[derive(Debug, PartialEq)]
        struct Tagged(&'static str, i64);

        let merged = MergedPaginator::new(Direction::Descending, |t: &Tagged| t.1)
            .with_source(ScriptedStream::new(vec![Tagged("first", 5), Tagged("first", 3)]))
            .with_source(ScriptedStream::new(vec![Tagged("second", 5), Tagged("second", 3)]));

        let items = merged.into_stream().await.flatten().await.unwrap();
        assert_eq!(
            items,
            vec![
                Tagged("first", 5),
                Tagged("second", 5),
                Tagged("first", 3),
                Tagged("second", 3),
            ]
        );
    }

    #[tokio::test]
    async fn limit_truncates_both_modes() {
        // Output length is min(limit, total).
        let streaming = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![9, 5]))
            .with_source(ScriptedStream::new(vec![8]))
            .with_limit(2)
            .into_stream()
            .await
            .flatten()
            .await
            .unwrap();
        assert_eq!(streaming, vec![9, 8]);

        let eager = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![9, 5]))
            .with_source(ScriptedStream::new(vec![8]))
            .with_limit(100)
            .collect_eager()
            .await
            .unwrap();
        assert_eq!(eager.len(), 3);
    }

    #[tokio::test]
    async fn source_failing_prefetch_is_dropped() {
        let merged = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![9, 5]))
            .with_source(ScriptedStream::broken(FetchError::PoolExhausted(
                "all cooling".into(),
            )))
            .with_source(ScriptedStream::new(vec![7]));

        let items = merged.into_stream().await.flatten().await.unwrap();
        assert_eq!(items, vec![9, 7, 5]);
    }

    #[tokio::test]
    async fn source_failing_mid_stream_is_dropped() {
        let merged = keyed(Direction::Descending)
            .with_source(ScriptedStream::failing_after(
                vec![9, 8],
                FetchError::PoolExhausted("all cooling".into()),
            ))
            .with_source(ScriptedStream::new(vec![7, 3]));

        let items = merged.into_stream().await.flatten().await.unwrap();
        // The failing source's yielded items stand; the rest comes from the
        // surviving source.
        assert_eq!(items, vec![9, 8, 7, 3]);
    }

    #[tokio::test]
    async fn fatal_mid_stream_surfaces_and_ends_merge() {
        let merged = keyed(Direction::Descending)
            .with_source(ScriptedStream::failing_after(
                vec![9],
                FetchError::Fatal {
                    code: 1002,
                    message: "bad arg".into(),
                },
            ))
            .with_source(ScriptedStream::new(vec![8, 7]));

        let mut stream = merged.into_stream().await;
        assert_eq!(stream.next().await.unwrap(), Some(9));
        let err = stream.next().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn eager_fatal_aborts_merge() {
        let merged = keyed(Direction::Descending)
            .with_source(ScriptedStream::new(vec![9]))
            .with_source(ScriptedStream::failing_after(
                vec![8],
                FetchError::Fatal {
                    code: -1,
                    message: "unknown kind".into(),
                },
            ));

        let err = merged.collect_eager().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn eager_keeps_partial_items_on_nonfatal_failure() {
        let merged = keyed(Direction::Descending)
            .with_source(ScriptedStream::failing_after(
                vec![9, 6],
                FetchError::Transient("timeout".into()),
            ))
            .with_source(ScriptedStream::new(vec![8, 7]));

        let items = merged.collect_eager().await.unwrap();
        assert_eq!(items, vec![9, 8, 7, 6]);
    }

    #[tokio::test]
    async fn no_sources_is_an_empty_stream() {
        let merged = keyed(Direction::Descending);
        let items = merged.into_stream().await.flatten().await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn merges_heterogeneous_paginators_behind_one_item_type() {
        // Different endpoint shapes merge through one closed tagged type
        // with a single key extractor.
        #[derive(Debug, PartialEq)]
        enum Event {
            Trade { ts: i64 },
            Notice { ts: i64 },
        }

        fn ts_of(event: &Event) -> i64 {
            match event {
                Event::Trade { ts } | Event::Notice { ts } => *ts,
            }
        }

        let trades = PagedPaginator::new(2, None, |page: u64| {
            let items = match page {
                1 => vec![Event::Trade { ts: 90 }, Event::Trade { ts: 60 }],
                _ => vec![Event::Trade { ts: 30 }],
            };
            std::future::ready(Ok(items))
        });
        let notices = PagedPaginator::new(2, None, |page: u64| {
            let items = match page {
                1 => vec![Event::Notice { ts: 80 }],
                _ => vec![],
            };
            std::future::ready(Ok(items))
        });

        let merged = MergedPaginator::new(Direction::Descending, ts_of)
            .with_source(trades)
            .with_source(notices);

        let items = merged.into_stream().await.flatten().await.unwrap();
        assert_eq!(
            items,
            vec![
                Event::Trade { ts: 90 },
                Event::Notice { ts: 80 },
                Event::Trade { ts: 60 },
                Event::Trade { ts: 30 },
            ]
        );
    }
}
