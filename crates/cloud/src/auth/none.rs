//! Anonymous (unsigned) access.

use crate::auth::CloudAuth;
use crate::error::Result;

/// No authentication: requests are sent unsigned.
///
/// This is the default for public model buckets, mirroring anonymous
/// object-store reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl CloudAuth for NoAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        _headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        Ok(())
    }
}
