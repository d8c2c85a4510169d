use axum::http::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

// Returned by the limiter when the quota for the current window is used up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit exceeded")]
pub struct RateLimitExceeded;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("could not read image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("request to inference API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference API did not answer within {0:?}")]
    Timeout(Duration),

    #[error("inference API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response from inference API: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY is not set; export it or pass --api-key")]
    MissingApiKey,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

// Everything that can go wrong between receiving an image and returning its text
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ExtractError {
    // Text shown to the end user in the output box
    pub fn user_message(&self) -> String {
        match self {
            ExtractError::RateLimited(_) => RATE_LIMIT_MESSAGE.to_string(),
            ExtractError::Media(MediaError::UnsupportedFormat(name)) => format!(
                "Unsupported image format: {name}. Please upload a .jpg, .jpeg or .png file."
            ),
            ExtractError::Media(MediaError::Io { path, .. }) => {
                format!("Could not read the image at {}.", path.display())
            }
            ExtractError::Inference(InferenceError::Timeout(after)) => format!(
                "The text recognition service did not answer within {} seconds. Please try again.",
                after.as_secs()
            ),
            ExtractError::Inference(InferenceError::MalformedResponse(_)) => {
                "The text recognition service returned an unexpected answer. Please try again."
                    .to_string()
            }
            ExtractError::Inference(InferenceError::Api { status, .. }) => {
                format!("The text recognition service returned an error (HTTP {status}).")
            }
            ExtractError::Inference(InferenceError::Request(_)) => {
                "Could not reach the text recognition service.".to_string()
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ExtractError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ExtractError::Media(MediaError::UnsupportedFormat(_)) => StatusCode::BAD_REQUEST,
            ExtractError::Media(MediaError::Io { .. }) => StatusCode::BAD_REQUEST,
            ExtractError::Inference(InferenceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ExtractError::Inference(_) => StatusCode::BAD_GATEWAY,
        }
    }

    // Short label used for the error metric and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::RateLimited(_) => "rate_limited",
            ExtractError::Media(MediaError::UnsupportedFormat(_)) => "unsupported_format",
            ExtractError::Media(MediaError::Io { .. }) => "io",
            ExtractError::Inference(InferenceError::Timeout(_)) => "timeout",
            ExtractError::Inference(InferenceError::Api { .. }) => "api",
            ExtractError::Inference(InferenceError::MalformedResponse(_)) => "malformed_response",
            ExtractError::Inference(InferenceError::Request(_)) => "request",
        }
    }
}
