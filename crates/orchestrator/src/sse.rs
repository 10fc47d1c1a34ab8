//! Server-sent event framing and the channel that carries frames to the caller.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::OrchestratorError;

pub const DONE_MARKER: &str = "[DONE]";
pub const ERROR_MARKER: &str = "[ERROR]";

/// One `data:` event sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Incremental model output, JSON-string encoded so newlines and
    /// non-ASCII text survive framing.
    Delta(String),
    /// Explanatory text that ends a request early without being an error.
    Info(String),
    Done,
    Error(String),
}

impl SseFrame {
    pub fn to_bytes(&self) -> Bytes {
        let payload = match self {
            Self::Delta(text) | Self::Info(text) => json_string(text),
            Self::Done => DONE_MARKER.to_string(),
            Self::Error(message) => format!("{ERROR_MARKER} {}", single_line(message)),
        };

        Bytes::from(format!("data: {payload}\n\n"))
    }
}

fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn single_line(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sending half of a request's event stream.
///
/// Every send fails with [`OrchestratorError::CallerDisconnected`] once the
/// receiving body has been dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Bytes>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, frame: SseFrame) -> Result<(), OrchestratorError> {
        self.tx
            .send(frame.to_bytes())
            .await
            .map_err(|_| OrchestratorError::CallerDisconnected)
    }

    pub async fn delta(&self, text: &str) -> Result<(), OrchestratorError> {
        self.send(SseFrame::Delta(text.to_string())).await
    }

    pub async fn info(&self, text: &str) -> Result<(), OrchestratorError> {
        self.send(SseFrame::Info(text.to_string())).await
    }

    pub async fn done(&self) -> Result<(), OrchestratorError> {
        self.send(SseFrame::Done).await
    }

    pub async fn error(&self, message: &str) -> Result<(), OrchestratorError> {
        self.send(SseFrame::Error(message.to_string())).await
    }

    /// Resolves once the caller has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_text(frame: SseFrame) -> String {
        String::from_utf8(frame.to_bytes().to_vec()).unwrap()
    }

    #[test]
    fn delta_is_json_encoded() {
        assert_eq!(frame_text(SseFrame::Delta("Hel".into())), "data: \"Hel\"\n\n");
    }

    #[test]
    fn delta_escapes_newlines_and_quotes() {
        let text = frame_text(SseFrame::Delta("fn main() {\n    println!(\"hi\");\n}".into()));

        assert_eq!(
            text,
            "data: \"fn main() {\\n    println!(\\\"hi\\\");\\n}\"\n\n"
        );
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn delta_keeps_non_ascii_text_intact() {
        let text = frame_text(SseFrame::Delta("código → ✓".into()));
        let payload = text.trim_start_matches("data: ").trim_end();
        let decoded: String = serde_json::from_str(payload).unwrap();

        assert_eq!(decoded, "código → ✓");
    }

    #[test]
    fn terminal_frames_use_fixed_markers() {
        assert_eq!(frame_text(SseFrame::Done), "data: [DONE]\n\n");
        assert_eq!(
            frame_text(SseFrame::Error("connection reset".into())),
            "data: [ERROR] connection reset\n\n"
        );
    }

    #[test]
    fn error_message_is_flattened_to_one_line() {
        assert_eq!(
            frame_text(SseFrame::Error("upstream\nfailed\r\n badly".into())),
            "data: [ERROR] upstream failed badly\n\n"
        );
    }

    #[tokio::test]
    async fn sink_reports_disconnect_after_receiver_drops() {
        let (sink, rx) = EventSink::channel(4);
        drop(rx);

        assert!(sink.is_closed());
        let error = sink.delta("lost").await.expect_err("receiver gone");
        assert!(matches!(error, OrchestratorError::CallerDisconnected));
    }
}
