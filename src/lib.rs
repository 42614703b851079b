//! Token Issuer library.
//!
//! Issues short-lived signed JWTs from caller-supplied claims: a key
//! registry loaded from a JSON Web Key Set, a claim policy listing the
//! accepted claim names, and an HTTP front end with optional OIDC caller
//! authentication.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod issuer;
pub mod jwks;
pub mod jwt;
pub mod metrics;
pub mod observability;
pub mod shutdown;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, IssueError};
pub use issuer::{IssuedToken, TokenIssuer};
