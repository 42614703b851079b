//! Token issuance pipeline.
//!
//! Every step is a guard: it either passes the request on or terminates it
//! with a specific [`IssueError`].

use crate::config::Config;
use crate::error::{ConfigError, IssueError};
use crate::jwks::KeyRegistry;
use crate::jwt::{self, ClaimPolicy, Claims};
use crate::metrics;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{error, info, warn};

/// Only accepted request method.
pub const ISSUE_METHOD: &str = "POST";

/// Only accepted request content type.
pub const REQUEST_CONTENT_TYPE: &str = "application/json";

/// Content type of an issued token.
pub const TOKEN_CONTENT_TYPE: &str = "application/jwt";

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact serialized JWT
    pub token: String,
    /// Identifier of the signing key
    pub kid: String,
    /// Algorithm the token was signed with
    pub algorithm: String,
    /// Unique token id (`id` claim)
    pub id: String,
}

/// Issues signed tokens from caller-supplied claims.
///
/// Holds only read-only state, so one instance is shared by all requests.
#[derive(Debug)]
pub struct TokenIssuer {
    registry: KeyRegistry,
    policy: ClaimPolicy,
    issuer: String,
}

impl TokenIssuer {
    /// Create an issuer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReservedClaim`] if the policy accepts a claim
    /// name the issuer generates itself.
    pub fn new(
        registry: KeyRegistry,
        policy: ClaimPolicy,
        issuer: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        policy.ensure_disjoint_from_reserved()?;
        Ok(Self {
            registry,
            policy,
            issuer: issuer.into(),
        })
    }

    /// Build the issuer from service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the key set, expiry or claim list is
    /// unusable.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let registry = KeyRegistry::initialize(&config.jwks_document, &config.expiry_seconds)?;
        let policy = ClaimPolicy::initialize(config.accepted_claims.as_deref());
        Self::new(registry, policy, config.issuer.clone())
    }

    /// Key registry in use.
    #[must_use]
    pub const fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Claim policy in use.
    #[must_use]
    pub const fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// Check method and content type before the body is read.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::BadMethod`] or [`IssueError::BadContentType`].
    pub fn preflight(method: &str, content_type: Option<&str>) -> Result<(), IssueError> {
        if method != ISSUE_METHOD {
            return Err(IssueError::BadMethod(method.to_string()));
        }
        if content_type != Some(REQUEST_CONTENT_TYPE) {
            return Err(IssueError::BadContentType(content_type.map(str::to_string)));
        }
        Ok(())
    }

    /// Run the full pipeline over an already read request.
    ///
    /// # Errors
    ///
    /// Returns the [`IssueError`] of the first failing step.
    pub fn issue(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        method: &str,
    ) -> Result<IssuedToken, IssueError> {
        let started = Instant::now();
        let result = Self::preflight(method, content_type)
            .and_then(|()| parse_payload(body))
            .and_then(|raw| self.sign_claims(raw));
        record_outcome(&result, started);
        result
    }

    /// Validate caller claims, merge them with system claims and sign.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::NoSigningKey`], [`IssueError::PolicyViolation`]
    /// or [`IssueError::SigningFailure`].
    pub fn sign_claims(&self, raw: HashMap<String, String>) -> Result<IssuedToken, IssueError> {
        let key = self.registry.select_signing_key()?;

        let claims = Claims::new(self.issuer.clone(), self.registry.token_lifetime_secs());
        let validated = self.policy.enforce(raw)?;
        let claims = claims.with_caller_claims(validated);

        let token = jwt::serialize(&claims, key)?;

        Ok(IssuedToken {
            token,
            kid: key.kid().to_string(),
            algorithm: key.algorithm().to_string(),
            id: claims.id,
        })
    }
}

/// Parse a flat JSON object of string values.
///
/// # Errors
///
/// Returns [`IssueError::BadPayload`] for anything else.
pub fn parse_payload(body: &[u8]) -> Result<HashMap<String, String>, IssueError> {
    serde_json::from_slice(body).map_err(|e| IssueError::BadPayload(e.to_string()))
}

/// Log and count the outcome of one issuance.
pub fn record_outcome(result: &Result<IssuedToken, IssueError>, started: Instant) {
    metrics::record_issue_latency(started.elapsed().as_secs_f64());
    match result {
        Ok(issued) => {
            metrics::record_token_issued(&issued.algorithm);
            info!(kid = %issued.kid, algorithm = %issued.algorithm, id = %issued.id, "Issued token");
        }
        Err(err) => record_failure(err),
    }
}

/// Log and count a rejected request.
pub fn record_failure(err: &IssueError) {
    metrics::record_issue_failure(err.reason());
    if err.is_caller_error() {
        warn!(reason = err.reason(), error = %err, "Rejected token request");
    } else {
        error!(reason = err.reason(), error = %err, "Token issuance failed");
    }
}
