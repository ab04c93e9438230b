//! `s3://bucket/key` location parsing.

use crate::error::{FetchError, Result};

/// A parsed S3 object location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    /// Parse an `s3://bucket/key` URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| FetchError::InvalidLocation(format!("not an s3 uri: {uri}")))?;

        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| FetchError::InvalidLocation(format!("missing object key: {uri}")))?;

        if bucket.is_empty() || key.is_empty() {
            return Err(FetchError::InvalidLocation(format!(
                "empty bucket or key: {uri}"
            )));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Virtual-hosted HTTPS URL for this object.
    pub fn https_url(&self) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, self.key)
    }
}

/// Whether a path string refers to a remote artifact.
pub fn is_remote(path: &str) -> bool {
    path.starts_with("s3://") || path.starts_with("http://") || path.starts_with("https://")
}

/// Resolve a remote path to a fetchable HTTPS/HTTP URL.
pub fn resolve_url(path: &str) -> Result<String> {
    if path.starts_with("s3://") {
        Ok(S3Location::parse(path)?.https_url())
    } else if path.starts_with("http://") || path.starts_with("https://") {
        Ok(path.to_string())
    } else {
        Err(FetchError::InvalidLocation(format!(
            "not a remote location: {path}"
        )))
    }
}
