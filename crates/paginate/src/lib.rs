//! Lazy paginated sequences over dispatched fetches
//!
//! Turns a paged or cursor-based resource into a lazy, finite, forward-only
//! sequence of items:
//!
//! - `PageBuffer` — shared buffering core: short-page exhaustion detection
//!   and an optional global item cap enforced at the consuming boundary
//! - `PagedPaginator` — cursor is a page number starting at 1
//! - `CursorPaginator` — cursor is the id of the last yielded item, so a
//!   captured cursor resumes the exact continuation
//! - `ItemStream` — dyn-compatible pull trait so heterogeneous paginators
//!   can be merged behind one item type
//! - `MergedPaginator` — streaming k-way heap merge, or eager
//!   drain-and-sort, across several sources sharing an ordering key
//!
//! Fetch closures are expected to go through the dispatcher; a paginator
//! performs no retry or rotation of its own. Abandoning a paginator is
//! always safe: fetches are awaited inline, never left running detached.

pub mod buffer;
pub mod cursor;
pub mod merge;
pub mod paged;
pub mod stream;

pub use buffer::PageBuffer;
pub use cursor::CursorPaginator;
pub use merge::{Direction, MergeKey, MergedPaginator, MergedStream};
pub use paged::PagedPaginator;
pub use stream::{ItemFuture, ItemStream};
