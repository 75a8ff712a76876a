//! Example server: reads settings from the environment (or `.env`), connects the
//! database named by DATABASE_URL and serves its tables under API_PREFIX.

use schemarest::{app, AppState, Settings};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("schemarest=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();
    let prefix = settings.api_prefix.clone();
    let state = AppState::from_settings(settings).await?;
    let driver = state.pool.dialect().driver_name();

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(driver, prefix = %prefix, "listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
