//! Registry of signing keys loaded from a JSON Web Key Set.

use crate::error::{ConfigError, KeyError};
use crate::jwks::key::{JwkSet, SigningKey};
use std::collections::HashSet;
use tracing::info;

/// Upper bound for the token lifetime (one year).
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Immutable, ordered collection of signing keys plus the token lifetime.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug)]
pub struct KeyRegistry {
    keys: Vec<SigningKey>,
    token_lifetime_secs: i64,
}

impl KeyRegistry {
    /// Parse a key set document and the configured token lifetime.
    ///
    /// An empty `keys` array is accepted; issuance then fails with
    /// [`KeyError::Empty`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is not a key set, a key is
    /// unusable, key ids collide, or the expiry is not a non-negative integer.
    pub fn initialize(jwks_document: &str, expiry_seconds: &str) -> Result<Self, ConfigError> {
        let set: JwkSet = serde_json::from_str(jwks_document)
            .map_err(|e| ConfigError::MalformedKeySet(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(set.keys.len());
        for (position, jwk) in set.keys.iter().enumerate() {
            let key = SigningKey::from_jwk(jwk, position)?;
            if !seen.insert(key.kid().to_string()) {
                return Err(ConfigError::DuplicateKeyId(key.kid().to_string()));
            }
            keys.push(key);
        }

        let token_lifetime_secs = parse_expiry(expiry_seconds)?;

        info!(
            keys = keys.len(),
            active_kid = keys.last().map(SigningKey::kid),
            token_lifetime_secs,
            "Key registry loaded"
        );

        Ok(Self::from_keys(keys, token_lifetime_secs))
    }

    /// Build a registry from already converted keys.
    #[must_use]
    pub fn from_keys(keys: Vec<SigningKey>, token_lifetime_secs: i64) -> Self {
        Self {
            keys,
            token_lifetime_secs,
        }
    }

    /// Select the key used to sign new tokens.
    ///
    /// The last key in document order is authoritative.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Empty`] if the registry holds no keys.
    pub fn select_signing_key(&self) -> Result<&SigningKey, KeyError> {
        self.keys.last().ok_or(KeyError::Empty)
    }

    /// Token lifetime in seconds.
    #[must_use]
    pub const fn token_lifetime_secs(&self) -> i64 {
        self.token_lifetime_secs
    }

    /// Key identifiers in registry order.
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(SigningKey::kid)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the registry holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn parse_expiry(value: &str) -> Result<i64, ConfigError> {
    let secs: i64 = value.parse().map_err(|e: std::num::ParseIntError| {
        ConfigError::InvalidExpiry {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    if secs < 0 {
        return Err(ConfigError::InvalidExpiry {
            value: value.to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    if secs > MAX_TOKEN_LIFETIME_SECS {
        return Err(ConfigError::InvalidExpiry {
            value: value.to_string(),
            reason: format!("must not exceed {MAX_TOKEN_LIFETIME_SECS}"),
        });
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_KEYS: &str = r#"{"keys":[
        {"kty":"oct","kid":"old","alg":"HS256","k":"b2xkLXNlY3JldA"},
        {"kty":"oct","kid":"new","alg":"HS384","k":"bmV3LXNlY3JldA"}
    ]}"#;

    #[test]
    fn test_selects_last_key() {
        let registry = KeyRegistry::initialize(TWO_KEYS, "3600").unwrap();
        let key = registry.select_signing_key().unwrap();

        assert_eq!(key.kid(), "new");
        assert_eq!(key.algorithm(), "HS384");
        assert_eq!(registry.key_ids().collect::<Vec<_>>(), vec!["old", "new"]);
    }

    #[test]
    fn test_selection_is_stable() {
        let registry = KeyRegistry::initialize(TWO_KEYS, "60").unwrap();
        let first = registry.select_signing_key().unwrap().kid().to_string();

        for _ in 0..10 {
            assert_eq!(registry.select_signing_key().unwrap().kid(), first);
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = KeyRegistry::initialize(r#"{"keys":[]}"#, "3600").unwrap();

        assert!(registry.is_empty());
        assert_eq!(registry.select_signing_key().unwrap_err(), KeyError::Empty);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            KeyRegistry::initialize("not json", "3600"),
            Err(ConfigError::MalformedKeySet(_))
        ));
        assert!(matches!(
            KeyRegistry::initialize(r#"{"kty":"oct"}"#, "3600"),
            Err(ConfigError::MalformedKeySet(_))
        ));
    }

    #[test]
    fn test_invalid_expiry() {
        for value in ["", "soon", "1.5", "-5"] {
            assert!(
                matches!(
                    KeyRegistry::initialize(TWO_KEYS, value),
                    Err(ConfigError::InvalidExpiry { .. })
                ),
                "expiry {value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_expiry_beyond_maximum_rejected() {
        let max = MAX_TOKEN_LIFETIME_SECS.to_string();
        assert_eq!(
            KeyRegistry::initialize(TWO_KEYS, &max).unwrap().token_lifetime_secs(),
            MAX_TOKEN_LIFETIME_SECS
        );

        let over = (MAX_TOKEN_LIFETIME_SECS + 1).to_string();
        for value in [over.as_str(), "9223372036854775807"] {
            assert!(
                matches!(
                    KeyRegistry::initialize(TWO_KEYS, value),
                    Err(ConfigError::InvalidExpiry { .. })
                ),
                "expiry {value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_expiry_allowed() {
        let registry = KeyRegistry::initialize(TWO_KEYS, "0").unwrap();
        assert_eq!(registry.token_lifetime_secs(), 0);
    }

    #[test]
    fn test_duplicate_kid() {
        let doc = r#"{"keys":[
            {"kty":"oct","kid":"same","alg":"HS256","k":"YQ"},
            {"kty":"oct","kid":"same","alg":"HS256","k":"Yg"}
        ]}"#;

        assert!(matches!(
            KeyRegistry::initialize(doc, "10"),
            Err(ConfigError::DuplicateKeyId(kid)) if kid == "same"
        ));
    }
}
