//! Upload destination allow-list
//!
//! Presigned URLs come from the API response, so they are checked before any
//! bytes are sent: only HTTPS object-storage hosts are accepted.

use crate::error::{Error, Result};

const STORAGE_ROOT_DOMAIN: &str = ".amazonaws.com";
const STORAGE_SERVICE_TOKEN: &str = "s3";

/// Reject any upload URL that is not an HTTPS S3 endpoint
///
/// Accepted hosts include `s3.amazonaws.com`, `s3-<region>.amazonaws.com`,
/// `<bucket>.s3.amazonaws.com`, `<bucket>.s3.dualstack.<region>.amazonaws.com`
/// and `<bucket>.s3-accelerate.amazonaws.com`.
pub fn validate_upload_url(raw: &str) -> Result<()> {
    let untrusted = |reason: String| Error::UntrustedDestination {
        url: raw.to_string(),
        reason,
    };

    let parsed = url::Url::parse(raw).map_err(|e| untrusted(format!("invalid URL: {e}")))?;

    if parsed.scheme() != "https" {
        return Err(untrusted(format!(
            "scheme '{}' is not allowed, only https",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| untrusted("URL has no host".to_string()))?;

    if !host.ends_with(STORAGE_ROOT_DOMAIN) || !host.contains(STORAGE_SERVICE_TOKEN) {
        return Err(untrusted(format!(
            "host '{host}' is not an S3 endpoint"
        )));
    }

    Ok(())
}
