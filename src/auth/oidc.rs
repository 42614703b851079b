//! Bearer token verification against an OpenID Connect provider.
//!
//! Provider keys are discovered through the issuer's metadata document,
//! cached for the configured TTL and refetched when an unknown `kid`
//! shows up, at most once per [`MIN_REFRESH_INTERVAL`].

use crate::auth::AuthenticatedCaller;
use crate::config::OidcConfig;
use crate::error::AuthError;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Lower bound between two key fetches triggered by unknown key ids.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Algorithms accepted on caller tokens. Symmetric algorithms never are.
const ALLOWED_ALGORITHMS: [Algorithm; 9] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

#[derive(Deserialize)]
struct ProviderMetadata {
    jwks_uri: String,
}

#[derive(Deserialize)]
struct CallerClaims {
    sub: Option<String>,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Verifies caller bearer tokens.
pub struct OidcVerifier {
    config: OidcConfig,
    client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl OidcVerifier {
    /// Create a verifier; nothing is fetched until the first request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ProviderUnavailable`] if the HTTP client cannot
    /// be built.
    pub fn new(config: OidcConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            client,
            cache: RwLock::new(None),
        })
    }

    /// Verify signature, lifetime, issuer and (when configured) audience.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenRejected`] for any invalid token and
    /// [`AuthError::ProviderUnavailable`] if provider keys cannot be fetched.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedCaller, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::TokenRejected(e.to_string()))?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::TokenRejected(format!(
                "algorithm {:?} not accepted",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::TokenRejected("missing kid".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.config.issuer]);
        validation.validate_nbf = true;
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<CallerClaims>(token, &key, &validation)
            .map_err(|e| AuthError::TokenRejected(e.to_string()))?;

        debug!(kid = %kid, sub = ?data.claims.sub, "Caller token verified");
        Ok(AuthenticatedCaller {
            subject: data.claims.sub,
        })
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let min_interval = MIN_REFRESH_INTERVAL.min(self.config.jwks_ttl);
        let unknown = || AuthError::TokenRejected(format!("unknown kid {kid}"));

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref() {
                let age = entry.fetched_at.elapsed();
                if age < self.config.jwks_ttl {
                    if let Some(key) = entry.keys.get(kid) {
                        return Ok(key.clone());
                    }
                    if age < min_interval {
                        return Err(unknown());
                    }
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while this one waited
        if let Some(entry) = cache.as_ref() {
            if entry.fetched_at.elapsed() < min_interval {
                return entry.keys.get(kid).cloned().ok_or_else(unknown);
            }
        }

        let entry = self.fetch_keys().await?;
        let key = entry.keys.get(kid).cloned();
        *cache = Some(entry);
        key.ok_or_else(unknown)
    }

    async fn fetch_keys(&self) -> Result<CachedKeys, AuthError> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            self.config.issuer.trim_end_matches('/')
        );
        let metadata: ProviderMetadata = self
            .client
            .get(&discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let set: JwkSet = self
            .client
            .get(&metadata.jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => warn!(kid = %kid, error = %e, "Skipping unusable provider key"),
            }
        }

        info!(jwks_uri = %metadata.jwks_uri, keys = keys.len(), "Identity provider keys fetched");
        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        })
    }
}

impl std::fmt::Debug for OidcVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcVerifier")
            .field("config", &self.config)
            .field("cache", &"<provider keys>")
            .finish()
    }
}
