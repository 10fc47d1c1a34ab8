//! HTTP client for the Ollama runtime.

use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use umlforge_config::OllamaConfig;

use crate::{compose::ChatMessage, OrchestratorError};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self, OrchestratorError> {
        let http = Client::builder()
            .build()
            .map_err(OrchestratorError::ClientInit)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            probe_timeout: Duration::from_secs(config.probe_timeout_seconds),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    /// Non-streaming chat call; returns the raw JSON payload.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Value, OrchestratorError> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };

        info!(%model, messages = messages.len(), "calling ollama chat");
        let response = self
            .http
            .post(self.chat_url())
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json::<Value>().await?)
    }

    /// Opens a streaming chat call and hands back the raw NDJSON byte stream.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, OrchestratorError> {
        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };

        info!(%model, messages = messages.len(), "opening ollama chat stream");
        let response = self
            .http
            .post(self.chat_url())
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.bytes_stream())
    }

    /// Lightweight reachability check against the tags endpoint.
    pub async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.http.get(&url).timeout(self.probe_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(%error, "ollama probe failed");
                false
            }
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, OrchestratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(OrchestratorError::UpstreamStatus {
        status: status.as_u16(),
        body,
    })
}
