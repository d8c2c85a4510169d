use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::InferenceError;
use crate::media::EncodedImage;
use crate::models::{MessagesRequest, MessagesResponse};

pub const MARKER: char = '★';
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

// Sent verbatim with every image; the ★ examples define the answer format parsed below
pub const PROMPT: &str = "The following image may contain text. There may be multiple parts of the image \
where text is present, possibly in different sizes and fonts return ALL TEXT. Un-obstruct text if it is \
covered by something, to make it readable. Interpret the text in the image as written and return ALL TEXT \
found, even smaller text, starting with the ★ symbol. Do not return any output other than the text that's \
in the image. If no text can be found, return \"No text found. Examples: ★NO PARKING violators may be \
towed at the owner's expense, ★No text found.";

// Something that can turn an encoded image into the text it shows.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &EncodedImage) -> Result<String, InferenceError>;
}

// Which part of a ★-delimited answer to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentMode {
    // Text between the first and second marker.
    #[default]
    First,
    // Every segment after the first marker, one per line.
    All,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub segments: SegmentMode,
}

// Long-lived client for the Messages API. Build once, share between requests.
pub struct InferenceClient {
    client: Client,
    config: ClientConfig,
}

impl InferenceClient {
    pub fn new(config: ClientConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        info!(
            "Inference client ready: model {} at {} (timeout {:?})",
            config.model, config.base_url, config.timeout
        );

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn map_transport(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout(self.config.timeout)
        } else {
            InferenceError::Request(e)
        }
    }
}

#[async_trait]
impl TextExtractor for InferenceClient {
    async fn extract_text(&self, image: &EncodedImage) -> Result<String, InferenceError> {
        let request =
            MessagesRequest::image_with_prompt(&self.config.model, self.config.max_tokens, image, PROMPT);
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        debug!(
            "Sending {} ({} base64 bytes) to {}",
            image.media_type,
            image.data.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Inference API returned {}: {}", status, body);
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: MessagesResponse = response.json().await.map_err(|e| self.map_transport(e))?;
        let text = body
            .first_text()
            .ok_or_else(|| InferenceError::MalformedResponse("response has no text content block".into()))?;

        extract_segments(text, self.config.segments)
    }
}

// Pull the transcription out of a ★-delimited model answer.
// Text before the first marker is preamble and is dropped. An answer without any
// marker does not follow the prompt's contract and is reported as malformed.
pub fn extract_segments(text: &str, mode: SegmentMode) -> Result<String, InferenceError> {
    let mut parts = text.split(MARKER);
    parts.next(); // preamble

    match mode {
        SegmentMode::First => parts
            .next()
            .map(str::to_string)
            .ok_or_else(|| InferenceError::MalformedResponse(format!("no {MARKER} marker in answer"))),
        SegmentMode::All => {
            if !text.contains(MARKER) {
                return Err(InferenceError::MalformedResponse(format!("no {MARKER} marker in answer")));
            }
            let segments: Vec<&str> = parts.map(str::trim).filter(|s| !s.is_empty()).collect();
            Ok(segments.join("\n"))
        }
    }
}
