//! The external cleanup service boundary.
//!
//! [`CleanupService`] is the only seam through which the batch processor talks
//! to the outside world. [`GeminiCleanupService`] implements it against the
//! Gemini `generateContent` REST API.

use std::time::Instant;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};

/// Instruction sent alongside every image.
pub const CLEANUP_PROMPT: &str = "Identify the watermark, logo, or text overlaid on the image. \
Seamlessly remove it and reconstruct the background texture behind it. \
The output MUST be the exact same image with ONLY the watermark removed. \
Do not shift, crop, resize, or alter the color grading of the rest of the image.";

/// MIME type assumed when the service does not name one.
pub const FALLBACK_MIME_TYPE: &str = "image/png";

/// A whole image to clean.
#[derive(Debug, Clone)]
pub struct CleanupRequest {
    /// Encoded image bytes.
    pub image_bytes: Vec<u8>,
    /// MIME type of `image_bytes`.
    pub mime_type: String,
}

/// The cleaned full-frame image.
#[derive(Debug, Clone)]
pub struct CleanupResponse {
    /// Encoded image bytes.
    pub image_bytes: Vec<u8>,
    /// MIME type of `image_bytes`.
    pub mime_type: String,
}

/// An opaque image-cleanup backend.
#[async_trait]
pub trait CleanupService: Send + Sync {
    /// Return a cleaned version of the whole image.
    ///
    /// # Errors
    ///
    /// Any failure is reported as an error; implementations must not retry on
    /// the caller's behalf.
    async fn clean(&self, request: CleanupRequest) -> Result<CleanupResponse>;
}

// Wire format. Gemini answers in camelCase; snake_case is accepted as well.

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData", alias = "inline_data", default)]
    inline_data: Option<InlineData>,
}

/// Pull the single inline image out of a `generateContent` response body.
///
/// # Errors
///
/// Returns [`Error::Service`] when the body is not valid JSON, has no content,
/// carries no image part, or the image payload is not valid base64.
pub fn extract_inline_image(body: &str) -> Result<CleanupResponse> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| Error::Service(format!("malformed response: {e}")))?;

    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| Error::Service("no content generated".to_string()))?;

    let (data, mime_type) = parts
        .into_iter()
        .filter_map(|p| p.inline_data)
        .find_map(|inline| match inline.data {
            Some(data) if !data.is_empty() => Some((data, inline.mime_type)),
            _ => None,
        })
        .ok_or_else(|| Error::Service("no image data found in response".to_string()))?;

    let image_bytes = general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| Error::Service(format!("invalid image payload: {e}")))?;

    Ok(CleanupResponse {
        image_bytes,
        mime_type: mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string()),
    })
}

/// Cleanup through Gemini's image model.
pub struct GeminiCleanupService {
    config: ServiceConfig,
    http_client: reqwest::Client,
}

impl GeminiCleanupService {
    /// Create a client. A missing API key is accepted and reported per call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint, self.config.model
        )
    }
}

#[async_trait]
impl CleanupService for GeminiCleanupService {
    #[instrument(skip(self, request), fields(mime_type = %request.mime_type, bytes = request.image_bytes.len()))]
    async fn clean(&self, request: CleanupRequest) -> Result<CleanupResponse> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Configuration("no API key configured".to_string()))?;

        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: Some(request.mime_type),
                            data: Some(general_purpose::STANDARD.encode(&request.image_bytes)),
                        },
                    },
                    RequestPart::Text {
                        text: CLEANUP_PROMPT,
                    },
                ],
            }],
        };

        let start = Instant::now();
        let response = self
            .http_client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(
            %status,
            elapsed_ms = start.elapsed().as_millis(),
            "cleanup service responded"
        );

        if !status.is_success() {
            warn!(%status, "cleanup service rejected request");
            let detail = if matches!(status.as_u16(), 401 | 403) {
                Error::Configuration(format!("API key rejected ({status}): {text}"))
            } else {
                Error::Service(format!("{status}: {text}"))
            };
            return Err(detail);
        }

        extract_inline_image(&text)
    }
}
