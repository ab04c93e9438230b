//! AWS S3 authentication headers.
//!
//! Credentials are read from the standard environment variables:
//! - `AWS_ACCESS_KEY_ID`
//! - `AWS_SECRET_ACCESS_KEY`
//! - `AWS_SESSION_TOKEN` (optional)
//! - `AWS_REGION` (optional, defaults to `us-east-1`)

use crate::auth::CloudAuth;
use crate::error::{FetchError, Result};

/// AWS credentials loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

impl AwsCredentials {
    /// Load credentials from standard AWS environment variables.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| FetchError::Auth("AWS_ACCESS_KEY_ID not set".into()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| FetchError::Auth("AWS_SECRET_ACCESS_KEY not set".into()))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| "us-east-1".to_string());

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
            region,
        })
    }
}

/// AWS S3 authentication using unsigned payload headers.
///
/// Adds `x-amz-content-sha256: UNSIGNED-PAYLOAD` and, when present, the
/// session token header. This covers IAM-based access behind VPC endpoints
/// and presigned URLs; full SigV4 request signing is not implemented here.
pub struct AwsAuth {
    credentials: AwsCredentials,
}

impl AwsAuth {
    /// Create from explicit credentials.
    pub fn new(credentials: AwsCredentials) -> Self {
        Self { credentials }
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            credentials: AwsCredentials::from_env()?,
        })
    }
}

impl CloudAuth for AwsAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        headers.push((
            "x-amz-content-sha256".to_string(),
            "UNSIGNED-PAYLOAD".to_string(),
        ));

        if let Some(ref token) = self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        Ok(())
    }
}
