use std::sync::Arc;

use anyhow::Context;

use medstock_api::app::services::{AppServices, CatalogSeed};
use medstock_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env()?;
    medstock_observability::init(config.log_format);
    config.log_summary();

    let services = AppServices::in_memory();
    if let Some(path) = &config.catalog_file {
        let loaded = CatalogSeed::load(path)?.apply(services.catalog());
        tracing::info!(records = loaded, "catalog seeded");
    }

    let app = medstock_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
