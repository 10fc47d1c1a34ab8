use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, Instrument};
use umlforge_orchestrator::{
    AutoRequest, ConversationHistory, DirectRequest, EventSink, ImageLimits,
};
use uuid::Uuid;

use crate::{ApiError, AppState};

pub const SSE_CHANNEL_SIZE: usize = 64;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/webp",
];

/// Raw multipart fields of a generation request.
#[derive(Debug, Default)]
pub struct GenerateForm {
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub messages: Option<String>,
    pub images: Vec<Bytes>,
    pub auto_mode: bool,
}

impl GenerateForm {
    /// Reads the form, rejecting an image part that is over the batch limit
    /// or of a disallowed type before its payload is read.
    pub async fn from_multipart(
        multipart: &mut Multipart,
        limits: &ImageLimits,
    ) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "model" => form.model = Some(field.text().await?),
                "prompt" => form.prompt = Some(field.text().await?),
                "messages" => form.messages = Some(field.text().await?),
                "auto_mode" => {
                    form.auto_mode = field.text().await?.trim().eq_ignore_ascii_case("true");
                }
                "images" => {
                    limits.check_count(form.images.len() + 1)?;
                    match field.content_type() {
                        Some(content_type) if is_allowed_image_type(content_type) => {}
                        Some(content_type) => {
                            return Err(ApiError::bad_request(format!(
                                "unsupported image type: {content_type}"
                            )));
                        }
                        None => {
                            return Err(ApiError::bad_request(
                                "image part is missing a content type",
                            ));
                        }
                    }
                    form.images.push(field.bytes().await?);
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

fn is_allowed_image_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_IMAGE_TYPES.contains(&essence.as_str())
}

enum Job {
    Auto(AutoRequest),
    Direct(DirectRequest),
}

/// `POST /generate/stream`.
///
/// Everything that can be rejected is rejected here with a JSON 400, before
/// the response is committed to SSE and before the model runtime is called.
pub async fn generate_stream(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let limits = state.orchestrator().limits();
    let form = GenerateForm::from_multipart(&mut multipart, &limits).await?;

    let prompt = form.prompt.unwrap_or_default();
    if prompt.trim().is_empty() && form.images.is_empty() {
        return Err(ApiError::bad_request("prompt or images are required"));
    }

    let history = match form.messages.as_deref() {
        Some(raw) => ConversationHistory::from_json(raw)?,
        None => ConversationHistory::default(),
    };
    let images = state.orchestrator().prepare_images(&form.images)?;

    let job = if form.auto_mode && !images.is_empty() {
        Job::Auto(AutoRequest {
            prompt,
            history,
            images,
        })
    } else {
        let model = form
            .model
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                ApiError::bad_request("model is required unless auto mode is used with images")
            })?;
        Job::Direct(DirectRequest {
            model,
            prompt,
            history,
            images,
        })
    };

    let span = tracing::info_span!(
        "generate_stream",
        %request_id,
        auto = matches!(job, Job::Auto(_))
    );
    span.in_scope(|| info!(images = form.images.len(), "accepted generation request"));

    let (sink, rx) = EventSink::channel(SSE_CHANNEL_SIZE);
    let orchestrator = state.shared_orchestrator();
    tokio::spawn(
        async move {
            match job {
                Job::Auto(request) => orchestrator.run_auto(request, sink).await,
                Job::Direct(request) => orchestrator.run_direct(request, sink).await,
            }
        }
        .instrument(span),
    );

    Ok(sse_response(rx))
}

fn sse_response(rx: mpsc::Receiver<Bytes>) -> Response {
    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    let body = Body::from_stream(stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(body)
        .unwrap_or_else(|error| {
            error!(%error, "failed to build streaming response");
            ApiError::internal_server_error("failed to build streaming response").into_response()
        })
}
