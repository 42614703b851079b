//! Request handlers.

use crate::auth::AuthenticatedCaller;
use crate::error::IssueError;
use crate::http::AppState;
use crate::issuer::{record_failure, TokenIssuer, TOKEN_CONTENT_TYPE};
use crate::metrics;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use tracing::{error, info_span};

/// Largest request body read, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

impl IntoResponse for IssueError {
    fn into_response(self) -> Response {
        // Detail stays in the logs
        let status = if self.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        status.into_response()
    }
}

/// `/v1/IssueToken`: turn a JSON claim declaration into a signed token.
pub async fn issue_token(
    State(state): State<AppState>,
    caller: Option<Extension<AuthenticatedCaller>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    if let Err(err) = TokenIssuer::preflight(method.as_str(), content_type) {
        record_failure(&err);
        return err.into_response();
    }

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            let err = IssueError::BodyReadFailure(e.to_string());
            record_failure(&err);
            return err.into_response();
        }
    };

    let subject = caller.and_then(|Extension(caller)| caller.subject);
    let span = info_span!("issue_token", caller = subject.as_deref().unwrap_or("-"));

    match span.in_scope(|| state.issuer.issue(&body, content_type, method.as_str())) {
        Ok(issued) => ([(header::CONTENT_TYPE, TOKEN_CONTENT_TYPE)], issued.token).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `/metrics`: Prometheus text exposition.
pub async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
