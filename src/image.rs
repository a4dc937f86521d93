use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::environment::ImageSettings;
use crate::TARGET_WEB_REQUEST;

static PLACEHOLDER_BASE: Lazy<Url> = Lazy::new(|| Url::parse("https://picsum.photos/").unwrap());

/// What the caller wants drawn.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub id: String,
    pub prompt: String,
    pub style: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Where a returned image came from; callers branch on this, never on errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    pub url: String,
    pub prompt: String,
    pub style: String,
    pub width: u32,
    pub height: u32,
    pub source: ImageSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GenerationItem>,
}

#[derive(Deserialize)]
struct GenerationItem {
    url: Option<String>,
}

/// Text-to-image client. Any failure is turned into a placeholder image.
#[derive(Clone, Debug)]
pub struct ImageGenerator {
    client: Client,
    settings: ImageSettings,
}

impl ImageGenerator {
    pub fn new(client: Client, settings: ImageSettings) -> Self {
        ImageGenerator { client, settings }
    }

    pub async fn generate(&self, request: &ImageRequest) -> GeneratedImage {
        let style = request
            .style
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_style.clone());

        match self.request_image(request, &style).await {
            Ok(url) => {
                info!(target: TARGET_WEB_REQUEST, "Generated image {} via AI", request.id);
                GeneratedImage {
                    id: request.id.clone(),
                    url,
                    prompt: request.prompt.clone(),
                    style,
                    width: request.width,
                    height: request.height,
                    source: ImageSource::Ai,
                    fallback_reason: None,
                }
            }
            Err(reason) => {
                warn!(target: TARGET_WEB_REQUEST, "Image {} falling back to placeholder: {}", request.id, reason);
                fallback_image(request, &style, &reason)
            }
        }
    }

    /// Returns the image URL, or a machine-readable failure reason.
    async fn request_image(&self, request: &ImageRequest, style: &str) -> Result<String, String> {
        let base_url = self
            .settings
            .base_url
            .as_deref()
            .ok_or_else(|| "not_configured".to_string())?;
        let endpoint = format!("{}/images/generations", base_url.trim_end_matches('/'));

        let mut body = json!({
            "prompt": request.prompt,
            "n": 1,
            "size": format!("{}x{}", request.width, request.height),
            "style": style,
            "quality": self.settings.default_quality,
        });
        if let Some(model) = &self.settings.model {
            body["model"] = json!(model);
        }

        let mut call = self.client.post(&endpoint).json(&body);
        if let Some(api_key) = &self.settings.api_key {
            call = call.bearer_auth(api_key);
        }

        let response = call.send().await.map_err(|err| {
            warn!(target: TARGET_WEB_REQUEST, "Image request to {} failed: {}", endpoint, err);
            "request_failed".to_string()
        })?;
        if !response.status().is_success() {
            return Err(format!("http_{}", response.status().as_u16()));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|_| "invalid_response".to_string())?;
        parsed
            .data
            .into_iter()
            .find_map(|item| item.url.filter(|url| !url.is_empty()))
            .ok_or_else(|| "empty_result".to_string())
    }
}

/// Seeded placeholder: the same `(id, width, height)` always yields the same URL.
pub fn placeholder_url(id: &str, width: u32, height: u32) -> String {
    let mut url = PLACEHOLDER_BASE.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push("seed")
            .push(id)
            .push(&width.to_string())
            .push(&height.to_string());
    }
    url.to_string()
}

pub fn fallback_image(request: &ImageRequest, style: &str, reason: &str) -> GeneratedImage {
    GeneratedImage {
        id: request.id.clone(),
        url: placeholder_url(&request.id, request.width, request.height),
        prompt: request.prompt.clone(),
        style: style.to_string(),
        width: request.width,
        height: request.height,
        source: ImageSource::Fallback,
        fallback_reason: Some(reason.to_string()),
    }
}
