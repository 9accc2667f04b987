use std::sync::Arc;

use anyhow::Context;

use lead_triage::api::auth::ApiKeyRegistry;
use lead_triage::api::{self, AppState};
use lead_triage::config::ServiceConfig;
use lead_triage::model::ModelContext;
use lead_triage::normalize::EmailNormalizer;
use lead_triage::pipeline::DecisionEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    // All six vectorizer/classifier artifacts plus the label encoder must
    // load before the service accepts traffic.
    let models = ModelContext::load(&config.model_dir).with_context(|| {
        format!(
            "Failed to load model artifacts from {}",
            config.model_dir.display()
        )
    })?;

    eprintln!("📧 Lead Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Models: {}", config.model_dir.display());
    eprintln!("   API keys: {} configured", config.api_keys.len());
    eprintln!("   Endpoints:");
    eprintln!("     GET  /               - API info");
    eprintln!("     GET  /health         - Health check");
    eprintln!("     POST /classify       - Classify single email");
    eprintln!("     POST /classify/batch - Classify up to {} emails", config.max_batch);

    let state = AppState {
        engine: Arc::new(DecisionEngine::new(models)),
        normalizer: Arc::new(EmailNormalizer::new()),
        keys: Arc::new(ApiKeyRegistry::new(config.api_keys.clone())),
        max_batch: config.max_batch,
    };

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Lead triage server started");
    axum::serve(listener, app).await?;

    Ok(())
}
