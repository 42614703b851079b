//! Token payload and the claim names the issuer owns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Claim names generated by the issuer. Callers can never supply these.
pub const RESERVED_CLAIMS: [&str; 5] = ["iss", "id", "iat", "nbf", "exp"];

/// Audience claim, always required from the caller.
pub const AUDIENCE_CLAIM: &str = "aud";

/// Returns true if `name` is generated by the issuer.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_CLAIMS.contains(&name)
}

/// Token payload: system claims plus the policy-validated caller claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Unique token id
    pub id: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Caller-supplied claims, `aud` included
    #[serde(flatten)]
    pub caller: BTreeMap<String, String>,
}

impl Claims {
    /// System claims for a token issued now.
    #[must_use]
    pub fn new(issuer: impl Into<String>, ttl_seconds: i64) -> Self {
        Self::issued_at(issuer, ttl_seconds, chrono::Utc::now().timestamp())
    }

    /// System claims for a token issued at `now` (seconds since the epoch).
    #[must_use]
    pub fn issued_at(issuer: impl Into<String>, ttl_seconds: i64, now: i64) -> Self {
        Claims {
            iss: issuer.into(),
            id: uuid::Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl_seconds),
            caller: BTreeMap::new(),
        }
    }

    /// Merge caller claims. Reserved names never reach the caller map.
    #[must_use]
    pub fn with_caller_claims(mut self, claims: BTreeMap<String, String>) -> Self {
        self.caller
            .extend(claims.into_iter().filter(|(name, _)| !is_reserved(name)));
        self
    }

    /// The caller's `aud` claim.
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.caller.get(AUDIENCE_CLAIM).map(String::as_str)
    }
}
