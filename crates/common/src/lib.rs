//! Shared types for Tidepool
//!
//! The error taxonomy (`FetchError`) is the contract between the endpoint
//! layer, the request executor, the dispatcher, and the paginators. The
//! `Payload` type carries opaque credential material with redacted debug
//! output.

mod error;
mod payload;

pub use error::{FetchError, FetchResult};
pub use payload::Payload;
