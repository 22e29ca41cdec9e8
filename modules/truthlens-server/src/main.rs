mod routes;
mod scheduler;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use truthlens_common::Config;
use truthlens_pipeline::analyzer::AnalyzeStage;
use truthlens_pipeline::fetch::FetchStage;
use truthlens_pipeline::orchestrator::Orchestrator;
use truthlens_pipeline::traits::{ArticleStore, StoreHandle};
use truthlens_store::{migrate, StoreClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("truthlens=info".parse()?))
        .init();

    info!("TruthLens server starting...");

    // Load config
    let config = Config::from_env();
    config.log_redacted();

    // Connect to Neo4j and run migrations
    let client =
        StoreClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?;
    migrate(&client).await?;

    // Wire the pipeline
    let store: Arc<dyn ArticleStore> = Arc::new(StoreHandle::new(client));
    let fetch = FetchStage::from_config(&config, store.clone())?;
    let analyze = AnalyzeStage::from_config(&config, store)?;
    let orchestrator = Arc::new(
        Orchestrator::new(fetch, analyze).with_default_batch_size(config.analysis_batch_size),
    );

    // Periodic fetch-then-analyze runs
    scheduler::spawn(orchestrator.clone(), config.scrape_interval_minutes);

    // Trigger surface
    let app = routes::router(orchestrator);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
