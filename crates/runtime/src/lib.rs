use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use umlforge_config::AppConfig;
use umlforge_orchestrator::Orchestrator;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub orchestrator: Arc<Orchestrator>,
    /// Result of the startup probe. The gateway still starts when the model
    /// runtime is down; requests then fail with an upstream error.
    pub upstream_reachable: bool,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let orchestrator = Arc::new(
            Orchestrator::new(config).context("failed to bootstrap orchestrator")?,
        );

        let upstream_reachable = orchestrator.upstream_reachable().await;
        if upstream_reachable {
            info!(base_url = %config.ollama.base_url, "model runtime reachable");
        } else {
            warn!(
                base_url = %config.ollama.base_url,
                "model runtime unreachable, proceeding anyway"
            );
        }

        info!(
            vision_model = %orchestrator.models().vision,
            text_model = %orchestrator.models().text,
            "orchestrator ready"
        );

        Ok(Self {
            orchestrator,
            upstream_reachable,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
