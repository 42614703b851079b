//! Centralized configuration for the token issuer.
//!
//! All configuration is loaded from environment variables and validated
//! at startup.

use crate::error::ConfigError;
use std::env;
use std::fmt;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human readable
    Pretty,
}

impl LogFormat {
    /// Parse format from string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid("LOG_FORMAT", format!("unknown format {s}"))),
        }
    }
}

/// OpenID Connect provider used to authenticate callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcConfig {
    /// Issuer URL; discovery lives under `/.well-known/openid-configuration`
    pub issuer: String,
    /// Audience the caller's token must carry
    pub audience: Option<String>,
    /// How long fetched provider keys are trusted
    pub jwks_ttl: Duration,
}

/// How callers are authenticated before reaching the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Every request is admitted
    Passthrough,
    /// Bearer tokens are verified against an OIDC provider
    Oidc(OidcConfig),
}

/// Token issuer configuration.
#[derive(Clone)]
pub struct Config {
    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    // Token settings
    /// JSON Web Key Set with the private signing keys
    pub jwks_document: String,
    /// Token lifetime in seconds, validated by the key registry
    pub expiry_seconds: String,
    /// `iss` claim value
    pub issuer: String,
    /// Comma-separated accepted claim names
    pub accepted_claims: Option<String>,

    // Transport
    /// Allowed CORS origins; empty mirrors the request origin
    pub cors_origins: Vec<String>,
    /// Caller authentication
    pub auth: AuthMode,

    // Logging
    /// Log output format
    pub log_format: LogFormat,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080)?;

        let jwks_document = required(&lookup, "JWTKS")?;
        let expiry_seconds = required(&lookup, "EXPIRY")?;
        let issuer = required(&lookup, "ISSUER")?;
        let accepted_claims = lookup("CLAIMS").filter(|v| !v.is_empty());

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let auth = if lookup("SKIP_OIDC").is_some_and(|v| !v.is_empty()) {
            AuthMode::Passthrough
        } else {
            AuthMode::Oidc(OidcConfig {
                issuer: required(&lookup, "OIDC_ISSUER")?,
                audience: lookup("OIDC_AUDIENCE").filter(|v| !v.is_empty()),
                jwks_ttl: Duration::from_secs(parse_or(&lookup, "OIDC_JWKS_TTL", 3600)?),
            })
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(format) => LogFormat::parse(&format)?,
            None => LogFormat::Json,
        };
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            host,
            port,
            jwks_document,
            expiry_seconds,
            issuer,
            accepted_claims,
            cors_origins,
            auth,
            log_format,
            log_level,
        })
    }

    /// Socket address string to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwks_document", &"<redacted>")
            .field("expiry_seconds", &self.expiry_seconds)
            .field("issuer", &self.issuer)
            .field("accepted_claims", &self.accepted_claims)
            .field("cors_origins", &self.cors_origins)
            .field("auth", &self.auth)
            .field("log_format", &self.log_format)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Read a variable that must be present and non-empty.
fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Missing(name.to_string()))
}

/// Parse variable with default value.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(name, e.to_string())),
        None => Ok(default),
    }
}
