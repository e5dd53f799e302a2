//! Google identity-token verification - JWT signature validation against
//! Google's JWKS
//!
//! # Verification flow
//!
//! 1. Read the token from the `<name>_token` header (optional `Bearer `
//!    prefix).
//! 2. Decode the JWT header (no verification) to extract `kid` and `alg`.
//! 3. Look the key up in the cached JWKS; on unknown `kid`, refresh the
//!    cache once before failing.
//! 4. Verify the signature and `exp`, then assert the audience equals the
//!    configured client id and the issuer is one of Google's issuer forms.
//!
//! The JWKS cache is refreshed by a background task on a configured
//! interval (default one hour), so request-path verification never blocks
//! on the network when the key is already cached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{AuthService, AuthServiceConfig, strip_bearer, token_header_name};
use crate::params::Claims;
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "google";

/// Issuer forms Google places in the `iss` claim
const GOOGLE_ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];

/// Configuration fragment for a Google auth service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoogleAuthConfig {
    #[serde(skip)]
    name: String,
    /// OAuth client id the token audience must equal
    client_id: String,
    /// JWKS endpoint; overridable for tests
    #[serde(default = "default_jwks_uri")]
    jwks_uri: String,
    /// How often the background task refreshes the JWKS
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    jwks_refresh_interval: Duration,
}

fn default_jwks_uri() -> String {
    "https://www.googleapis.com/oauth2/v3/certs".to_string()
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(3600)
}

/// Decode a `google` fragment
pub fn decode_config(
    name: &str,
    fragment: &serde_yaml::Value,
) -> Result<Box<dyn AuthServiceConfig>> {
    let mut config: GoogleAuthConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("auth service {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl AuthServiceConfig for GoogleAuthConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self) -> Result<Arc<dyn AuthService>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ServerError::Config(format!(
                    "auth service {}: unable to build HTTP client: {e}",
                    self.name
                ))
            })?;

        let service = Arc::new(GoogleAuthService {
            name: self.name.clone(),
            header_name: token_header_name(&self.name),
            client_id: self.client_id.clone(),
            jwks_uri: self.jwks_uri.clone(),
            client,
            keys: RwLock::new(JwkSet { keys: Vec::new() }),
            refresh_task: Mutex::new(None),
        });

        // Prime the cache; a failure here is survivable (tokens fail until
        // the background refresh succeeds) but worth a loud warning.
        match service.refresh_jwks().await {
            Ok(count) => info!(service = %self.name, keys = count, "JWKS cache primed"),
            Err(e) => {
                warn!(service = %self.name, error = %e, "initial JWKS fetch failed; token verification unavailable until refresh succeeds");
            }
        }

        service.spawn_refresh_task(self.jwks_refresh_interval);
        Ok(service)
    }
}

/// Live Google token validator
pub struct GoogleAuthService {
    name: String,
    header_name: String,
    client_id: String,
    jwks_uri: String,
    client: reqwest::Client,
    /// Current JWKS snapshot; replaced wholesale on refresh
    keys: RwLock<JwkSet>,
    refresh_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl GoogleAuthService {
    /// Fetch the JWKS and replace the cached snapshot
    async fn refresh_jwks(&self) -> Result<usize> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ServerError::Internal(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| ServerError::Internal(format!("JWKS parse failed: {e}")))?;

        let count = jwks.keys.len();
        *self.keys.write() = jwks;
        Ok(count)
    }

    /// Start the interval refresh task
    ///
    /// The task holds only a weak reference, so dropping the last strong
    /// handle stops it even without an explicit `close`.
    fn spawn_refresh_task(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(service) = weak.upgrade() else {
                    break;
                };
                match service.refresh_jwks().await {
                    Ok(count) => debug!(service = %service.name, keys = count, "JWKS refreshed"),
                    Err(e) => warn!(service = %service.name, error = %e, "JWKS refresh failed"),
                }
            }
        });
        *self.refresh_task.lock() = Some(handle);
    }

    /// Find a decoding key by `kid`, refreshing the cache once on a miss
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = find_key_in_jwks(&self.keys.read(), kid) {
            return Ok(key);
        }

        debug!(service = %self.name, kid = %kid, "key not found in cached JWKS, refreshing");
        self.refresh_jwks().await.map_err(|e| self.invalid(e.to_string()))?;
        find_key_in_jwks(&self.keys.read(), kid)
            .ok_or_else(|| self.invalid(format!("unknown key id {kid}")))
    }

    fn invalid(&self, reason: impl Into<String>) -> ServerError {
        ServerError::TokenInvalid {
            service: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn verify(&self, token: &str, key: &DecodingKey, alg: Algorithm) -> Result<Claims> {
        let mut validation = Validation::new(alg);
        validation.leeway = 60; // tolerate minor clock skew against the IdP
        // audience handled manually below to support string and array forms
        validation.validate_aud = false;

        let data: TokenData<Claims> = jsonwebtoken::decode(token, key, &validation)
            .map_err(|e| self.invalid(e.to_string()))?;
        let claims = data.claims;

        match claims.get("aud") {
            Some(aud) if audience_matches(aud, &self.client_id) => {}
            _ => return Err(self.invalid(format!("audience does not match {}", self.client_id))),
        }

        match claims.get("iss").and_then(Value::as_str) {
            Some(iss) if GOOGLE_ISSUERS.contains(&iss) => {}
            other => {
                return Err(self.invalid(format!(
                    "unexpected issuer {}",
                    other.unwrap_or("<missing>")
                )));
            }
        }

        Ok(claims)
    }
}

#[async_trait]
impl AuthService for GoogleAuthService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn claims_from_headers(&self, headers: &HeaderMap) -> Result<Option<Claims>> {
        let Some(raw) = headers.get(self.header_name.as_str()) else {
            return Ok(None);
        };
        let raw = raw
            .to_str()
            .map_err(|_| self.invalid("token header is not valid UTF-8"))?;
        let token = strip_bearer(raw);
        if token.is_empty() {
            return Err(self.invalid("token header is empty"));
        }

        let header = jsonwebtoken::decode_header(token).map_err(|e| self.invalid(e.to_string()))?;
        let alg = match header.alg {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 | Algorithm::ES256 => header.alg,
            other => return Err(self.invalid(format!("unsupported algorithm {other:?}"))),
        };
        let kid = header
            .kid
            .ok_or_else(|| self.invalid("token header has no kid"))?;

        let key = self.decoding_key(&kid).await?;
        self.verify(token, &key, alg).map(Some)
    }

    async fn close(&self) {
        if let Some(handle) = self.refresh_task.lock().take() {
            handle.abort();
        }
    }
}

/// Find a JWK by `kid` and convert it to a decoding key
fn find_key_in_jwks(jwks: &JwkSet, kid: &str) -> Option<DecodingKey> {
    for jwk in &jwks.keys {
        if jwk.common.key_id.as_deref() != Some(kid) {
            continue;
        }
        return match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
            AlgorithmParameters::EllipticCurve(ec) => {
                DecodingKey::from_ec_components(&ec.x, &ec.y).ok()
            }
            AlgorithmParameters::OctetKey(_) | AlgorithmParameters::OctetKeyPair(_) => None,
        };
    }
    None
}

/// Match the `aud` claim against the configured client id; `aud` may be a
/// single string or an array
fn audience_matches(aud: &Value, client_id: &str) -> bool {
    match aud {
        Value::String(s) => s == client_id,
        Value::Array(entries) => entries
            .iter()
            .any(|v| v.as_str().is_some_and(|s| s == client_id)),
        _ => false,
    }
}
