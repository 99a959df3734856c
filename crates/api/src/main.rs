use std::sync::Arc;

use anyhow::Context;

use rolegate_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rolegate_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(rolegate_api::app::build_services(&config).await?);
    let app = rolegate_api::app::build_app(services.clone());

    // Expired sessions are dropped on lookup; this sweeps the ones never looked up again.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let purged = services.sessions.purge_expired(chrono::Utc::now());
            if purged > 0 {
                tracing::debug!(purged, "expired sessions removed");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
