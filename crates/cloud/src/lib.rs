//! # Cropmask Cloud
//!
//! Remote artifact fetching for the crop mask pipeline.
//!
//! Model artifacts and training-data manifests may live on the local
//! filesystem or in object storage (`s3://bucket/key`, anonymous or
//! credentialed). This crate resolves such locations and streams their
//! bytes into a caller-supplied writer with bounded memory.
//!
//! Transient-failure retry/backoff is deliberately absent: the outer
//! orchestration layer owns retries, a fetch here either succeeds or
//! reports a distinct error.

pub mod auth;
pub mod error;
pub mod fetch;
pub mod s3;

pub use auth::{AwsAuth, CloudAuth, NoAuth};
pub use error::{FetchError, Result};
pub use fetch::Fetcher;
pub use s3::S3Location;

/// Blocking API re-exported as `blocking` module.
pub mod blocking {
    pub use crate::fetch::blocking::*;
}
