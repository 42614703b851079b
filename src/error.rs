//! Error types for the token issuer.
//!
//! Errors fall into three classes:
//! - [`ConfigError`]: startup-fatal, the process must not serve traffic
//! - caller errors: the request was malformed or violated the claim policy
//! - internal faults: the deployment is misconfigured (no key, unusable key)

use thiserror::Error;

/// Startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is absent or empty
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// A configuration value could not be parsed
    #[error("Invalid {name}: {reason}")]
    Invalid {
        /// Variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The key set document is not a valid JSON Web Key Set
    #[error("Malformed key set: {0}")]
    MalformedKeySet(String),

    /// A key inside the key set cannot be used for signing
    #[error("Invalid key {kid}: {reason}")]
    InvalidKey {
        /// Key identifier, or its position when the key has none
        kid: String,
        /// Why the key was rejected
        reason: String,
    },

    /// Two keys in the set share an identifier
    #[error("Duplicate key id: {0}")]
    DuplicateKeyId(String),

    /// The token lifetime is not a non-negative integer
    #[error("Invalid expiry {value:?}: {reason}")]
    InvalidExpiry {
        /// Raw configured value
        value: String,
        /// Parse failure
        reason: String,
    },

    /// An accepted claim name collides with a system-generated claim
    #[error("Claim {0:?} is reserved and cannot be supplied by callers")]
    ReservedClaim(String),
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-key error.
    #[must_use]
    pub fn invalid_key(kid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            kid: kid.into(),
            reason: reason.into(),
        }
    }
}

/// Signing key selection errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The registry holds no keys
    #[error("Key registry is empty")]
    Empty,
}

/// Claim policy violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An accepted claim was not supplied
    #[error("Request does not include value for claim {0}")]
    MissingClaim(String),

    /// Claims outside the accepted set were supplied
    #[error("Unexpected claims: {0:?}")]
    UnexpectedClaims(Vec<String>),
}

/// Token issuance errors.
///
/// Every variant is terminal for the request that produced it.
#[derive(Error, Debug)]
pub enum IssueError {
    /// Request method is not POST
    #[error("Bad method {0}")]
    BadMethod(String),

    /// Content type is not exactly `application/json`
    #[error("Bad content type {0:?}")]
    BadContentType(Option<String>),

    /// Request body could not be read
    #[error("Bad body read: {0}")]
    BodyReadFailure(String),

    /// Body is not a flat JSON object of strings
    #[error("Bad body parse: {0}")]
    BadPayload(String),

    /// No signing key is available
    #[error("No signing key: {0}")]
    NoSigningKey(#[from] KeyError),

    /// Supplied claims violate the claim policy
    #[error("Policy violation: {0}")]
    PolicyViolation(#[from] ValidationError),

    /// The signing primitive rejected the key/algorithm pairing
    #[error("Signing error: {0}")]
    SigningFailure(String),
}

impl IssueError {
    /// Check if this error was caused by the caller.
    ///
    /// Caller errors are rejected requests; everything else is an internal
    /// fault pointing at a deployment defect.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        !matches!(self, Self::NoSigningKey(_) | Self::SigningFailure(_))
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::BadMethod(_) => "bad_method",
            Self::BadContentType(_) => "bad_content_type",
            Self::BodyReadFailure(_) => "body_read_failure",
            Self::BadPayload(_) => "bad_payload",
            Self::NoSigningKey(_) => "no_signing_key",
            Self::PolicyViolation(ValidationError::MissingClaim(_)) => "missing_claim",
            Self::PolicyViolation(ValidationError::UnexpectedClaims(_)) => "unexpected_claims",
            Self::SigningFailure(_) => "signing_failure",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for IssueError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::SigningFailure(err.to_string())
    }
}

/// Upstream authentication failures.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No bearer token on the request
    #[error("Bearer token missing")]
    TokenMissing,

    /// Token could not be verified
    #[error("Token rejected: {0}")]
    TokenRejected(String),

    /// Provider metadata or keys could not be retrieved
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl AuthError {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::TokenMissing => "token_missing",
            Self::TokenRejected(_) => "token_rejected",
            Self::ProviderUnavailable(_) => "provider_unavailable",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::ProviderUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors() {
        assert!(IssueError::BadMethod("GET".to_string()).is_caller_error());
        assert!(IssueError::BadContentType(None).is_caller_error());
        assert!(IssueError::BodyReadFailure("reset".to_string()).is_caller_error());
        assert!(IssueError::BadPayload("eof".to_string()).is_caller_error());
        assert!(IssueError::from(ValidationError::MissingClaim("aud".to_string())).is_caller_error());
    }

    #[test]
    fn test_internal_faults() {
        assert!(!IssueError::from(KeyError::Empty).is_caller_error());
        assert!(!IssueError::SigningFailure("bad key".to_string()).is_caller_error());
    }

    #[test]
    fn test_reason_labels() {
        let err = IssueError::from(ValidationError::UnexpectedClaims(vec!["extra".to_string()]));
        assert_eq!(err.reason(), "unexpected_claims");
        assert_eq!(IssueError::from(KeyError::Empty).reason(), "no_signing_key");
        assert_eq!(AuthError::TokenMissing.reason(), "token_missing");
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::MissingClaim("aud".to_string());
        assert_eq!(err.to_string(), "Request does not include value for claim aud");

        let err = ConfigError::ReservedClaim("iss".to_string());
        assert_eq!(err.to_string(), "Claim \"iss\" is reserved and cannot be supplied by callers");
    }
}
