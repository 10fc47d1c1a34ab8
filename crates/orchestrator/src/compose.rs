//! Conversation assembly for the outgoing chat call.

use serde::{Deserialize, Serialize};

use crate::OrchestratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: None,
        }
    }
}

/// Prior turns supplied by the caller. When non-empty the last turn is the
/// user's current message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new(messages: Vec<ChatMessage>) -> Result<Self, OrchestratorError> {
        if let Some(last) = messages.last() {
            if last.role != Role::User {
                return Err(OrchestratorError::validation(
                    "the last message in the conversation history must come from the user",
                ));
            }
        }

        Ok(Self { messages })
    }

    /// Parses the JSON array sent in the `messages` form field.
    pub fn from_json(raw: &str) -> Result<Self, OrchestratorError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let messages: Vec<ChatMessage> = serde_json::from_str(raw).map_err(|error| {
            OrchestratorError::validation(format!("invalid messages field: {error}"))
        })?;

        Self::new(messages)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Builds the text-only conversation for the second step: the last history
/// turn is replaced by the rewritten prompt plus the extracted diagrams.
pub fn compose_with_diagrams(
    history: ConversationHistory,
    rewritten_prompt: &str,
    diagram_text: &str,
) -> Vec<ChatMessage> {
    let content = format!("{rewritten_prompt}\n\n{diagram_text}");

    replace_last_turn(history, content, None)
        .into_iter()
        .map(|message| ChatMessage {
            images: None,
            ..message
        })
        .collect()
}

/// Builds the conversation for a direct call: the prompt replaces the last
/// turn and carries the images, if any.
pub fn compose_direct(
    history: ConversationHistory,
    prompt: &str,
    images: Vec<String>,
) -> Vec<ChatMessage> {
    let images = (!images.is_empty()).then_some(images);
    replace_last_turn(history, prompt.to_string(), images)
}

fn replace_last_turn(
    history: ConversationHistory,
    content: String,
    images: Option<Vec<String>>,
) -> Vec<ChatMessage> {
    let mut messages = history.messages;

    match messages.last_mut() {
        Some(last) => {
            *last = ChatMessage {
                role: Role::User,
                content,
                images,
            };
        }
        None => messages.push(ChatMessage {
            role: Role::User,
            content,
            images,
        }),
    }

    messages
}
