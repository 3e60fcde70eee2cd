// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::sync::Arc;

use crate::adk::error::{Result, VireError};
use crate::adk::model::{Content, GenerationConfig, Model, Part};

const CAPTION_PROMPT: &str =
    "Describe this image in one concise sentence. Mention the main objects, their attributes and the scene.";

/// Produces the one shared caption of a run
#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image_ref: &str) -> Result<String>;
}

/// Captioner backed by a vision-capable chat model
pub struct ModelCaptioner {
    model: Arc<dyn Model>,
}

impl ModelCaptioner {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Captioner for ModelCaptioner {
    async fn caption(&self, image_ref: &str) -> Result<String> {
        let image = image_source(image_ref).await?;
        let request = [Content {
            role: "user".to_string(),
            parts: vec![Part::Text(CAPTION_PROMPT.to_string()), Part::Image { url: image }],
        }];

        let response = self
            .model
            .generate_content(&request, Some(&GenerationConfig::with_temperature(0.0)), None)
            .await?;

        let caption = response.text().trim().to_string();
        if caption.is_empty() {
            return Err(VireError::other(format!(
                "captioning model returned no text for '{}'",
                image_ref
            )));
        }
        log::info!("Caption: {}", caption);
        Ok(caption)
    }
}

/// URL a vision model can fetch: remote and data URLs pass through, local
/// files are inlined as base64 data URLs
pub async fn image_source(image_ref: &str) -> Result<String> {
    if let Ok(parsed) = url::Url::parse(image_ref) {
        if matches!(parsed.scheme(), "http" | "https" | "data") {
            return Ok(image_ref.to_string());
        }
    }

    let bytes = tokio::fs::read(image_ref).await?;
    Ok(format!(
        "data:{};base64,{}",
        mime_for(Path::new(image_ref)),
        STANDARD.encode(bytes)
    ))
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}
