//! Streaming HTTP fetch into a caller-supplied writer.

use crate::auth::CloudAuth;
use crate::error::{FetchError, Result};
use crate::s3::resolve_url;
use reqwest::Client;
use std::io::Write;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for streaming remote artifacts.
///
/// Bytes are drained chunk by chunk into the destination writer, so peak
/// memory stays bounded regardless of artifact size. There is no retry
/// loop: transient-failure handling belongs to the caller.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the default request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with an explicit request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Stream the body of `url` into `dest`.
    ///
    /// Returns the number of bytes written. Non-success HTTP statuses are
    /// reported as [`FetchError::Unreachable`].
    pub async fn fetch_to<W: Write>(
        &self,
        url: &str,
        auth: &dyn CloudAuth,
        dest: &mut W,
    ) -> Result<u64> {
        let mut auth_headers = Vec::new();
        auth.sign_request(url, "GET", &mut auth_headers)?;

        let mut req = self.client.get(url);
        for (key, value) in &auth_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let mut resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut written: u64 = 0;
        while let Some(chunk) = resp.chunk().await? {
            dest.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        dest.flush()?;

        Ok(written)
    }
}

/// Blocking (synchronous) API.
///
/// Wraps the async [`Fetcher`] with a current-thread Tokio runtime so
/// callers inside the synchronous per-tile pipeline don't manage their own
/// async runtime.
pub mod blocking {
    use super::*;

    /// Resolve a remote path (`s3://` or `http(s)://`) and stream its bytes
    /// into `dest`, blocking until done. Returns the number of bytes written.
    pub fn fetch_to_writer<W: Write>(
        path: &str,
        auth: &dyn CloudAuth,
        dest: &mut W,
    ) -> Result<u64> {
        let url = resolve_url(path)?;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FetchError::Runtime(e.to_string()))?;

        let fetcher = Fetcher::new()?;
        rt.block_on(fetcher.fetch_to(&url, auth, dest))
    }
}
