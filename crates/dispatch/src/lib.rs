//! Resilient request dispatch over a credential pool
//!
//! Composes the credential pool with a retrying executor:
//!
//! - `RetryPolicy` — pure backoff configuration (attempts, delays, jitter)
//! - `RequestExecutor` — one logical request per credential, transient
//!   failures retried in place with exponential backoff
//! - `Dispatcher` — rotates credentials on rate-limit and invalid-session
//!   outcomes until one succeeds or the pool is exhausted
//! - `classify` — maps transport errors, HTTP statuses, and application
//!   status codes into the `FetchError` taxonomy for the endpoint layer

pub mod classify;
pub mod dispatcher;
pub mod executor;
pub mod retry;

pub use dispatcher::Dispatcher;
pub use executor::RequestExecutor;
pub use retry::RetryPolicy;
