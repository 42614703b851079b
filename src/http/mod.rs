//! HTTP transport: routing, CORS and request tracing around the issuer.

pub mod handlers;

use crate::auth::{require_authentication, AuthGate};
use crate::error::ConfigError;
use crate::issuer::TokenIssuer;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::MAX_BODY_BYTES;

/// Path of the issuance endpoint.
pub const ISSUE_PATH: &str = "/v1/IssueToken";

/// Path of the metrics endpoint.
pub const METRICS_PATH: &str = "/metrics";

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    /// The issuance pipeline
    pub issuer: Arc<TokenIssuer>,
}

/// Build the CORS policy.
///
/// With no configured origins the request origin is mirrored.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if an origin is `*` or not a valid
/// header value.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    if origins.iter().any(|origin| origin == "*") {
        return Err(ConfigError::invalid(
            "CORS_ORIGINS",
            "wildcard cannot be combined with credentials",
        ));
    }

    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|e| ConfigError::invalid("CORS_ORIGINS", format!("{origin}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_methods([Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .allow_origin(allow_origin))
}

/// Assemble the service router.
///
/// Every method is routed to the issuance handler so that non-POST requests
/// are rejected by the issuer itself; the authentication gate guards only
/// that route.
pub fn router(state: AppState, gate: Arc<AuthGate>, cors: CorsLayer) -> Router {
    let issuance = Router::new()
        .route(ISSUE_PATH, any(handlers::issue_token))
        .route_layer(middleware::from_fn_with_state(gate, require_authentication))
        .with_state(state);

    Router::new()
        .route(METRICS_PATH, get(handlers::metrics_handler))
        .merge(issuance)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
