//! Relays an Ollama NDJSON stream to the caller as SSE deltas.

use std::fmt::Display;

use bytes::{Buf, BytesMut};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{sse::EventSink, OrchestratorError};

#[derive(Debug, Deserialize)]
struct StreamStep {
    #[serde(default)]
    message: Option<StepMessage>,
}

#[derive(Debug, Deserialize)]
struct StepMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Parses one NDJSON line. Lines without non-empty `message.content` (for
/// example the final `done` step) yield `None`.
pub fn parse_step(line: &[u8]) -> Result<Option<String>, OrchestratorError> {
    let step: StreamStep =
        serde_json::from_slice(line).map_err(OrchestratorError::MalformedUpstreamLine)?;

    Ok(step
        .message
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty()))
}

/// Summary of a finished relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub deltas: usize,
    pub skipped: usize,
}

/// Forwards every content delta from `upstream` to `sink` as it arrives.
///
/// Returns once the upstream ends cleanly. Terminal frames are left to the
/// caller; an upstream failure comes back as
/// [`OrchestratorError::StreamInterrupted`].
pub async fn relay<S, E>(upstream: S, sink: &EventSink) -> Result<RelayStats, OrchestratorError>
where
    S: Stream<Item = Result<bytes::Bytes, E>>,
    E: Display,
{
    futures_util::pin_mut!(upstream);

    let mut buffer = BytesMut::new();
    let mut stats = RelayStats::default();
    // Bytes of `buffer` already known to hold no newline.
    let mut scanned = 0;

    while let Some(chunk) = upstream.next().await {
        let chunk = chunk.map_err(|error| OrchestratorError::StreamInterrupted(error.to_string()))?;
        buffer.extend_from_slice(&chunk);

        while let Some(offset) = buffer[scanned..].iter().position(|byte| *byte == b'\n') {
            let newline = scanned + offset;
            let line = buffer.split_to(newline + 1);
            scanned = 0;
            forward_line(&line[..newline], sink, &mut stats).await?;
        }
        scanned = buffer.len();
    }

    if buffer.has_remaining() {
        let line = buffer.split();
        forward_line(&line, sink, &mut stats).await?;
    }

    debug!(deltas = stats.deltas, skipped = stats.skipped, "upstream stream finished");
    Ok(stats)
}

async fn forward_line(
    line: &[u8],
    sink: &EventSink,
    stats: &mut RelayStats,
) -> Result<(), OrchestratorError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(());
    }

    match parse_step(line) {
        Ok(Some(content)) => {
            sink.delta(&content).await?;
            stats.deltas += 1;
        }
        Ok(None) => {}
        Err(error) => {
            stats.skipped += 1;
            warn!(%error, line = %String::from_utf8_lossy(line), "skipping malformed upstream line");
        }
    }

    Ok(())
}
