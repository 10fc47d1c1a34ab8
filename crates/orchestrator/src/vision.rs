//! First step of auto mode: transcribe diagrams in the uploaded images.

use serde_json::Value;
use tracing::{info, warn};

use crate::{compose::ChatMessage, encoder::EncodedBatch, ollama::OllamaClient, OrchestratorError};

pub const NO_DIAGRAM_SENTINEL: &str = "No diagram";

pub const VISION_INSTRUCTIONS: &str = "You will receive one or more images. Process them in the \
order they were provided. For each image that contains a UML or software diagram, transcribe it \
as PlantUML inside its own fenced code block that starts with ```plantuml, contains @startuml and \
@enduml, and ends with ```. For each image that does not contain a recognizable diagram, write \
exactly the text No diagram on its own line instead of a code block. Do not add explanations, \
titles, or any other text.";

type ExtractionStrategy = fn(&Value) -> Option<String>;

/// Tried in order; the first strategy that yields text wins.
const EXTRACTION_STRATEGIES: &[(&str, ExtractionStrategy)] = &[
    ("message.content", from_message),
    ("choices", from_choices),
    ("response", from_response),
];

fn from_message(payload: &Value) -> Option<String> {
    non_empty(payload.get("message")?.get("content")?)
}

fn from_choices(payload: &Value) -> Option<String> {
    let choice = payload.get("choices")?.as_array()?.first()?;
    choice
        .get("message")
        .and_then(|message| message.get("content"))
        .or_else(|| choice.get("content"))
        .and_then(non_empty)
}

fn from_response(payload: &Value) -> Option<String> {
    payload.get("response")?.as_str().map(str::to_string)
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Pulls the answer text out of a non-streaming chat payload. Unknown shapes
/// degrade to the serialized payload instead of failing.
pub fn extract_content(payload: &Value) -> String {
    for (name, strategy) in EXTRACTION_STRATEGIES {
        if let Some(text) = strategy(payload) {
            tracing::trace!(strategy = name, "extracted response content");
            return text;
        }
    }

    let keys: Vec<&str> = payload
        .as_object()
        .map(|object| object.keys().map(String::as_str).collect())
        .unwrap_or_default();
    warn!(?keys, "unrecognised response shape, using raw payload");
    payload.to_string()
}

/// True when the vision model classified every image as a non-diagram.
pub fn is_no_diagram(text: &str) -> bool {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty()).peekable();
    lines.peek().is_some() && lines.all(|line| line == NO_DIAGRAM_SENTINEL)
}

/// Sends every image with the fixed instructions to the vision model and
/// returns its full answer.
pub async fn extract_diagrams(
    client: &OllamaClient,
    model: &str,
    images: &EncodedBatch,
) -> Result<String, OrchestratorError> {
    let message = ChatMessage {
        images: Some(images.as_slice().to_vec()),
        ..ChatMessage::user(VISION_INSTRUCTIONS)
    };

    let payload = client.chat(model, std::slice::from_ref(&message)).await?;
    let text = extract_content(&payload);
    info!(%model, images = images.len(), chars = text.len(), "diagram extraction finished");

    Ok(text)
}
