//! Validation and base64 encoding of uploaded image batches.

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use umlforge_config::OrchestratorConfig;

use crate::OrchestratorError;

/// Upper bounds applied to every uploaded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_images: usize,
    pub max_image_bytes: usize,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_images: 5,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

impl From<&OrchestratorConfig> for ImageLimits {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_images: config.max_images,
            max_image_bytes: config.max_image_bytes,
        }
    }
}

impl ImageLimits {
    /// Fails once `count` exceeds the batch limit. Usable while uploads are
    /// still arriving, before their payloads are read.
    pub fn check_count(&self, count: usize) -> Result<(), OrchestratorError> {
        if count > self.max_images {
            return Err(OrchestratorError::validation(format!(
                "too many images: at most {} allowed",
                self.max_images
            )));
        }
        Ok(())
    }

    /// Checks batch and per-image sizes without touching the payloads.
    pub fn validate(&self, images: &[Bytes]) -> Result<(), OrchestratorError> {
        self.check_count(images.len())?;

        if let Some(index) = images
            .iter()
            .position(|image| image.len() > self.max_image_bytes)
        {
            return Err(OrchestratorError::validation(format!(
                "image {} is too large: maximum size is {} MiB",
                index + 1,
                self.max_image_bytes / (1024 * 1024)
            )));
        }

        Ok(())
    }
}

/// Images ready for transport, one base64 string per upload, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBatch {
    images: Vec<String>,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.images
    }

    pub fn into_vec(self) -> Vec<String> {
        self.images
    }
}

/// Validates the whole batch first, then encodes every image. Nothing is
/// returned unless all images encode.
pub fn encode_batch(
    images: &[Bytes],
    limits: &ImageLimits,
) -> Result<EncodedBatch, OrchestratorError> {
    limits.validate(images)?;

    let images = images
        .iter()
        .enumerate()
        .map(|(index, image)| encode_image(index, image))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EncodedBatch { images })
}

fn encode_image(index: usize, image: &[u8]) -> Result<String, OrchestratorError> {
    if image.is_empty() {
        return Err(OrchestratorError::Encoding {
            index: index + 1,
            reason: "image payload is empty".to_string(),
        });
    }

    Ok(general_purpose::STANDARD.encode(image))
}
