//! Upstream caller authentication.
//!
//! The gate runs before the issuance route and rejects unauthenticated
//! callers with 401; the issuer itself never sees those requests.

pub mod oidc;

use crate::config::AuthMode;
use crate::error::AuthError;
use crate::metrics;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

pub use oidc::OidcVerifier;

/// Identity established by the gate, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCaller {
    /// `sub` claim of the caller's token, if any
    pub subject: Option<String>,
}

/// Authentication policy for inbound requests.
#[derive(Debug)]
pub enum AuthGate {
    /// Admit everything
    Passthrough,
    /// Require a bearer token issued by the configured provider
    Oidc(OidcVerifier),
}

impl AuthGate {
    /// Build the gate for the configured mode.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the OIDC client cannot be created.
    pub fn from_mode(mode: &AuthMode) -> Result<Self, AuthError> {
        match mode {
            AuthMode::Passthrough => Ok(Self::Passthrough),
            AuthMode::Oidc(config) => Ok(Self::Oidc(OidcVerifier::new(config.clone())?)),
        }
    }

    /// Authenticate a request from its headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the caller is not authenticated.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedCaller, AuthError> {
        match self {
            Self::Passthrough => Ok(AuthenticatedCaller { subject: None }),
            Self::Oidc(verifier) => {
                let token = bearer_token(headers).ok_or(AuthError::TokenMissing)?;
                verifier.verify(token).await
            }
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Axum middleware enforcing the gate.
pub async fn require_authentication(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.authenticate(request.headers()).await {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(err) => {
            metrics::record_auth_rejection(err.reason());
            warn!(reason = err.reason(), error = %err, "Unauthenticated request rejected");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_passthrough_admits_everything() {
        let caller = AuthGate::Passthrough.authenticate(&HeaderMap::new()).await.unwrap();
        assert_eq!(caller.subject, None);
    }

    #[tokio::test]
    async fn test_oidc_requires_token() {
        let gate = AuthGate::from_mode(&AuthMode::Oidc(crate::config::OidcConfig {
            issuer: "http://127.0.0.1:9".to_string(),
            audience: None,
            jwks_ttl: std::time::Duration::from_secs(60),
        }))
        .unwrap();

        let err = gate.authenticate(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenMissing));
    }
}
