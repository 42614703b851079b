//! Prometheus metrics for the token issuer.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_issuer_tokens_issued_total",
        "Total number of tokens issued",
        &["algorithm"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Rejected or failed issuance counter.
pub static ISSUE_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_issuer_issue_failures_total",
        "Total number of failed token requests",
        &["reason"]
    )
    .expect("Failed to register issue_failures metric")
});

/// Issuance latency histogram.
pub static ISSUE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "token_issuer_issue_latency_seconds",
        "Token issuance latency in seconds",
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]
    )
    .expect("Failed to register issue_latency metric")
});

/// Authentication gate rejections counter.
pub static AUTH_REJECTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_issuer_auth_rejections_total",
        "Total number of requests rejected by the authentication gate",
        &["reason"]
    )
    .expect("Failed to register auth_rejections metric")
});

/// Record a token issuance.
pub fn record_token_issued(algorithm: &str) {
    TOKENS_ISSUED.with_label_values(&[algorithm]).inc();
}

/// Record a failed issuance.
pub fn record_issue_failure(reason: &str) {
    ISSUE_FAILURES.with_label_values(&[reason]).inc();
}

/// Record issuance latency.
pub fn record_issue_latency(duration_secs: f64) {
    ISSUE_LATENCY.observe(duration_secs);
}

/// Record an authentication gate rejection.
pub fn record_auth_rejection(reason: &str) {
    AUTH_REJECTIONS.with_label_values(&[reason]).inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    // Register the unlabelled histogram even before the first request
    Lazy::force(&ISSUE_LATENCY);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_token_issued() {
        record_token_issued("ES256");
        let value = TOKENS_ISSUED.with_label_values(&["ES256"]).get();
        assert!(value > 0.0);
    }

    #[test]
    fn test_record_issue_failure() {
        record_issue_failure("missing_claim");
        let value = ISSUE_FAILURES.with_label_values(&["missing_claim"]).get();
        assert!(value > 0.0);
    }

    #[test]
    fn test_render_contains_families() {
        record_issue_latency(0.002);
        let text = render().unwrap();

        assert!(text.contains("token_issuer_issue_latency_seconds_bucket"));
    }
}
