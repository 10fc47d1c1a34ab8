//! Request-scoped generation flows that end in a terminal SSE frame.

use std::fmt;

use tracing::{debug, info, warn, Instrument};

use crate::{
    compose::{compose_direct, compose_with_diagrams, ChatMessage, ConversationHistory},
    encoder::EncodedBatch,
    relay::relay,
    rewrite::rewrite_prompt,
    sse::EventSink,
    vision::{extract_diagrams, is_no_diagram},
    Orchestrator, OrchestratorError,
};

pub const NO_DIAGRAM_MESSAGE: &str = "No diagrams were detected in the provided images. \
Upload images that contain UML or software diagrams to generate code from them.";

/// Auto mode: extract diagrams with the vision model, then stream the text
/// model's answer to the rewritten prompt.
#[derive(Debug, Clone)]
pub struct AutoRequest {
    pub prompt: String,
    pub history: ConversationHistory,
    pub images: EncodedBatch,
}

/// Direct mode: stream the caller-chosen model's answer to the prompt.
#[derive(Debug, Clone)]
pub struct DirectRequest {
    pub model: String,
    pub prompt: String,
    pub history: ConversationHistory,
    pub images: EncodedBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStage {
    ExtractingDiagrams,
    Rewriting,
    Composing,
    Streaming,
}

impl fmt::Display for AutoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExtractingDiagrams => "extracting_diagrams",
            Self::Rewriting => "rewriting",
            Self::Composing => "composing",
            Self::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

impl Orchestrator {
    /// Runs auto mode and always finishes the event stream with exactly one
    /// terminal frame, unless the caller has already gone.
    pub async fn run_auto(&self, request: AutoRequest, sink: EventSink) {
        let span = tracing::info_span!("auto_generation", images = request.images.len());
        let outcome = until_disconnected(&sink, self.auto_pipeline(request, &sink))
            .instrument(span)
            .await;
        finish(outcome, &sink).await;
    }

    /// Runs direct mode with the same terminal guarantees as [`Self::run_auto`].
    pub async fn run_direct(&self, request: DirectRequest, sink: EventSink) {
        let span = tracing::info_span!(
            "direct_generation",
            model = %request.model,
            images = request.images.len()
        );
        let outcome = until_disconnected(&sink, self.direct_pipeline(request, &sink))
            .instrument(span)
            .await;
        finish(outcome, &sink).await;
    }

    async fn auto_pipeline(
        &self,
        request: AutoRequest,
        sink: &EventSink,
    ) -> Result<(), OrchestratorError> {
        let AutoRequest {
            prompt,
            history,
            images,
        } = request;
        if images.is_empty() {
            return Err(OrchestratorError::validation(
                "auto mode requires at least one image",
            ));
        }

        debug!(stage = %AutoStage::ExtractingDiagrams, "entering stage");
        let diagrams = extract_diagrams(self.client(), &self.models().vision, &images).await?;
        if is_no_diagram(&diagrams) {
            return Err(OrchestratorError::NoDiagramDetected);
        }

        debug!(stage = %AutoStage::Rewriting, "entering stage");
        let rewritten = rewrite_prompt(&prompt);

        debug!(stage = %AutoStage::Composing, history = history.len(), "entering stage");
        let messages = compose_with_diagrams(history, &rewritten, &diagrams);

        debug!(stage = %AutoStage::Streaming, "entering stage");
        self.stream_chat(&self.models().text, &messages, sink).await
    }

    async fn direct_pipeline(
        &self,
        request: DirectRequest,
        sink: &EventSink,
    ) -> Result<(), OrchestratorError> {
        let messages = compose_direct(request.history, &request.prompt, request.images.into_vec());
        self.stream_chat(&request.model, &messages, sink).await
    }

    /// Streams a chat completion into `sink` without emitting a terminal frame.
    pub async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        sink: &EventSink,
    ) -> Result<(), OrchestratorError> {
        let upstream = self.client().chat_stream(model, messages).await?;
        let stats = relay(upstream, sink).await?;
        info!(%model, deltas = stats.deltas, skipped = stats.skipped, "generation streamed");
        Ok(())
    }
}

/// Drops `work`, and with it any open upstream request, as soon as the
/// caller disconnects.
async fn until_disconnected<F>(sink: &EventSink, work: F) -> Result<(), OrchestratorError>
where
    F: std::future::Future<Output = Result<(), OrchestratorError>>,
{
    tokio::select! {
        outcome = work => outcome,
        _ = sink.closed() => Err(OrchestratorError::CallerDisconnected),
    }
}

async fn finish(outcome: Result<(), OrchestratorError>, sink: &EventSink) {
    let delivered = match outcome {
        Ok(()) => sink.done().await,
        Err(OrchestratorError::NoDiagramDetected) => {
            info!("no diagrams detected, ending stream early");
            match sink.info(NO_DIAGRAM_MESSAGE).await {
                Ok(()) => sink.done().await,
                Err(error) => Err(error),
            }
        }
        Err(OrchestratorError::CallerDisconnected) => {
            info!("caller disconnected, upstream released");
            return;
        }
        Err(error) => {
            warn!(%error, "generation failed");
            sink.error(&error.to_string()).await
        }
    };

    if delivered.is_err() {
        debug!("caller disconnected before the terminal event");
    }
}
