//! Auth-service abstraction - identity-token validators
//!
//! Each auth service owns one request header, `<name>_token`. An absent
//! header means the service simply did not verify on this request; a
//! present-but-invalid token refuses the whole request. The per-request
//! claims map contains only the services that verified.

pub mod google;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::params::{Claims, ClaimsMap};
use crate::Result;

/// Decoded configuration for one auth service, ready to be initialized
#[async_trait]
pub trait AuthServiceConfig: Send + Sync {
    /// Kind tag this configuration was registered under
    fn kind(&self) -> &'static str;

    /// Build the live validator (may fetch key material)
    async fn initialize(&self) -> Result<Arc<dyn AuthService>>;
}

/// A live identity-token validator
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Service name from the document
    fn name(&self) -> &str;

    /// Kind tag
    fn kind(&self) -> &'static str;

    /// Locate and verify this service's token in the request headers
    ///
    /// Returns `Ok(None)` when the header is absent, `Ok(Some(claims))` on
    /// successful verification, and an error when a token was present but
    /// failed validation.
    async fn claims_from_headers(&self, headers: &HeaderMap) -> Result<Option<Claims>>;

    /// Stop background work owned by the service
    async fn close(&self) {}
}

/// Header key an auth service reads its token from
#[must_use]
pub fn token_header_name(service: &str) -> String {
    format!("{service}_token")
}

/// Extract a token value, tolerating an optional `Bearer ` prefix
#[must_use]
pub fn strip_bearer(raw: &str) -> &str {
    raw.strip_prefix("Bearer ").unwrap_or(raw).trim()
}

/// Build the request-level claims map
///
/// Every configured service gets a verification attempt. Services whose
/// header is absent are omitted; a service whose token fails verification
/// aborts the request with that error.
pub async fn verify_claims(
    services: &HashMap<String, Arc<dyn AuthService>>,
    headers: &HeaderMap,
) -> Result<ClaimsMap> {
    let mut claims = ClaimsMap::new();
    for (name, service) in services {
        if let Some(verified) = service.claims_from_headers(headers).await? {
            claims.insert(name.clone(), verified);
        }
    }
    Ok(claims)
}
