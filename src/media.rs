use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use crate::errors::MediaError;

// Image types the inference API accepts from us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Base64 payload plus its declared type, ready to go into a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: String,
    pub media_type: MediaType,
}

impl EncodedImage {
    pub fn new(data: String, media_type: MediaType) -> Self {
        Self { data, media_type }
    }
}

// Read the whole file and base64 it
pub fn encode(path: &Path) -> Result<String, MediaError> {
    let bytes = std::fs::read(path).map_err(|source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(encode_bytes(&bytes))
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

// Declared type from the file extension, case-insensitive
pub fn media_type(filename: &str) -> Result<MediaType, MediaError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        Ok(MediaType::Jpeg)
    } else if lower.ends_with(".png") {
        Ok(MediaType::Png)
    } else {
        Err(MediaError::UnsupportedFormat(filename.to_string()))
    }
}

// Short content hash, lets logs tie requests to an upload without logging the upload
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}
