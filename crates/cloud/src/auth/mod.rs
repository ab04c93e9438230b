//! Authentication for object-store reads.

mod aws;
mod none;

pub use aws::{AwsAuth, AwsCredentials};
pub use none::NoAuth;

use crate::error::Result;

/// Trait for signing HTTP requests to cloud storage providers.
///
/// Implementations add authentication headers to outgoing requests before
/// they are sent. Anonymous access is the [`NoAuth`] implementation, which
/// adds nothing; public model buckets are read unsigned.
pub trait CloudAuth: Send + Sync {
    /// Sign a request by adding authentication headers.
    fn sign_request(
        &self,
        url: &str,
        method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()>;
}
