//! Diagram-aware generation pipeline in front of an Ollama runtime.
//!
//! Auto mode runs these stages in order, once per request:
//!
//! 1. [`encode_batch`] validates and base64-encodes the uploaded images.
//! 2. [`extract_diagrams`] asks the pinned vision model for PlantUML.
//! 3. [`rewrite_prompt`] points the prompt at the PlantUML instead of the images.
//! 4. [`compose_with_diagrams`] replaces the last history turn.
//! 5. [`relay`] streams the text model's NDJSON output as SSE frames.

mod compose;
mod encoder;
mod error;
mod ollama;
mod pipeline;
mod relay;
mod rewrite;
mod sse;
mod vision;

use bytes::Bytes;
use tracing::info;
use umlforge_config::AppConfig;

pub use compose::{compose_direct, compose_with_diagrams, ChatMessage, ConversationHistory, Role};
pub use encoder::{encode_batch, EncodedBatch, ImageLimits};
pub use error::OrchestratorError;
pub use ollama::OllamaClient;
pub use pipeline::{AutoRequest, AutoStage, DirectRequest, NO_DIAGRAM_MESSAGE};
pub use relay::{parse_step, relay, RelayStats};
pub use rewrite::rewrite_prompt;
pub use sse::{EventSink, SseFrame, DONE_MARKER, ERROR_MARKER};
pub use vision::{
    extract_content, extract_diagrams, is_no_diagram, NO_DIAGRAM_SENTINEL, VISION_INSTRUCTIONS,
};

/// Model identifiers used internally by auto mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedModels {
    pub vision: String,
    pub text: String,
}

pub struct Orchestrator {
    client: OllamaClient,
    models: PinnedModels,
    limits: ImageLimits,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Result<Self, OrchestratorError> {
        let client = OllamaClient::new(&config.ollama)?;
        let models = PinnedModels {
            vision: config.orchestrator.vision_model.clone(),
            text: config.orchestrator.text_model.clone(),
        };
        let limits = ImageLimits::from(&config.orchestrator);

        info!(
            base_url = %client.base_url(),
            vision_model = %models.vision,
            text_model = %models.text,
            "orchestrator configured"
        );

        Ok(Self {
            client,
            models,
            limits,
        })
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    pub fn models(&self) -> &PinnedModels {
        &self.models
    }

    pub fn limits(&self) -> ImageLimits {
        self.limits
    }

    /// Validates and encodes uploads. Runs before any upstream call.
    pub fn prepare_images(&self, images: &[Bytes]) -> Result<EncodedBatch, OrchestratorError> {
        encode_batch(images, &self.limits)
    }

    pub async fn upstream_reachable(&self) -> bool {
        self.client.probe().await
    }
}
