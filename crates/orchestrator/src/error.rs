use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Bad caller input, detected before any upstream call.
    #[error("{0}")]
    Validation(String),
    #[error("failed to encode image {index}: {reason}")]
    Encoding { index: usize, reason: String },
    #[error("model runtime unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),
    #[error("model runtime returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("upstream stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("malformed upstream line: {0}")]
    MalformedUpstreamLine(#[source] serde_json::Error),
    #[error("no diagram detected in the supplied images")]
    NoDiagramDetected,
    #[error("caller disconnected")]
    CallerDisconnected,
    #[error("failed to build http client: {0}")]
    ClientInit(#[source] reqwest::Error),
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for errors caused by the caller's input rather than by processing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Encoding { .. })
    }
}
