use anyhow::Context;

use col_api::app::{build_app, services};
use col_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    col_observability::init();

    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr.clone();

    let services = services::build(config).await?;
    let app = build_app(services.state, services.session_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
