use anyhow::Context;
use std::sync::Arc;
use token_issuer::auth::AuthGate;
use token_issuer::http::{self, AppState};
use token_issuer::observability::{init_tracing, TracingConfig};
use token_issuer::{shutdown, Config, TokenIssuer};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    init_tracing(&TracingConfig::from_config(&config));

    if let Err(e) = run(config).await {
        error!(error = ?e, "Token Issuer failed to start");
        return Err(e);
    }
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(config = ?config, "Starting Token Issuer");

    let issuer = Arc::new(TokenIssuer::from_config(&config).context("building key registry")?);
    let gate = Arc::new(AuthGate::from_mode(&config.auth).context("building auth gate")?);
    let cors = http::cors_layer(&config.cors_origins)?;

    let app = http::router(AppState { issuer }, gate, cors);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(address = %addr, "Token Issuer listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .context("serving requests")?;

    info!("Shutdown complete");
    Ok(())
}
