use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::errors::{ExtractError, MediaError};
use crate::inference::TextExtractor;
use crate::media::{self, EncodedImage};
use crate::metrics::{ERRORS_TOTAL, INFERENCE_LATENCY, QUOTA_REMAINING, RATE_LIMITED_TOTAL};
use crate::rate_limit::RateLimiter;

// Image in, text out. The extractor call is the only part that spends quota.
pub struct RequestHandler {
    extractor: Arc<dyn TextExtractor>,
    limiter: Arc<RateLimiter>,
}

impl RequestHandler {
    pub fn new(extractor: Arc<dyn TextExtractor>, limiter: Arc<RateLimiter>) -> Self {
        QUOTA_REMAINING.set(limiter.max_calls() as f64);
        Self { extractor, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    // File on disk to display text; failures come back as readable messages
    pub async fn handle(&self, image_path: &Path) -> String {
        match self.handle_path(image_path).await {
            Ok(text) => text,
            Err(e) => e.user_message(),
        }
    }

    pub async fn handle_path(&self, image_path: &Path) -> Result<String, ExtractError> {
        let filename = image_path.to_string_lossy();
        // type first: a rejected extension should not cost a read or a quota slot
        let media_type = media::media_type(&filename).inspect_err(|e| self.record_failure(e))?;
        let data = media::encode(image_path).inspect_err(|e| self.record_failure(e))?;

        self.extract(&filename, EncodedImage::new(data, media_type)).await
    }

    // Same pipeline for an upload held in memory
    pub async fn handle_upload(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
        let media_type = media::media_type(filename).inspect_err(|e| self.record_failure(e))?;
        info!(
            "Upload {} ({} bytes, {}, sha256 {})",
            filename,
            bytes.len(),
            media_type,
            media::fingerprint(bytes)
        );

        self.extract(filename, EncodedImage::new(media::encode_bytes(bytes), media_type))
            .await
    }

    async fn extract(&self, filename: &str, image: EncodedImage) -> Result<String, ExtractError> {
        let started = Instant::now();
        let outcome = self
            .limiter
            .guard(|| self.extractor.extract_text(&image))
            .await;
        QUOTA_REMAINING.set(self.limiter.remaining(Instant::now()) as f64);

        let result = match outcome {
            Ok(inner) => {
                INFERENCE_LATENCY.observe(started.elapsed().as_secs_f64());
                inner.map_err(ExtractError::from)
            }
            Err(limited) => {
                RATE_LIMITED_TOTAL.inc();
                warn!("Rejected {}: call quota used up", filename);
                return Err(limited.into());
            }
        };

        match &result {
            Ok(text) => info!("Extracted {} chars from {} in {:?}", text.chars().count(), filename, started.elapsed()),
            Err(e) => {
                ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
                error!("Extraction failed for {}: {}", filename, e);
            }
        }
        result
    }

    fn record_failure(&self, e: &MediaError) {
        let err_kind = match e {
            MediaError::Io { .. } => "io",
            MediaError::UnsupportedFormat(_) => "unsupported_format",
        };
        ERRORS_TOTAL.with_label_values(&[err_kind]).inc();
        warn!("Rejected input: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{InferenceError, RATE_LIMIT_MESSAGE};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    // Records what it was asked to read and answers with a canned result
    struct FakeExtractor {
        seen: Mutex<Vec<EncodedImage>>,
        answer: fn() -> Result<String, InferenceError>,
    }

    impl FakeExtractor {
        fn answering(answer: fn() -> Result<String, InferenceError>) -> Arc<Self> {
            Arc::new(Self { seen: Mutex::new(Vec::new()), answer })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextExtractor for FakeExtractor {
        async fn extract_text(&self, image: &EncodedImage) -> Result<String, InferenceError> {
            self.seen.lock().unwrap().push(image.clone());
            (self.answer)()
        }
    }

    fn handler(fake: &Arc<FakeExtractor>, max_calls: u32) -> RequestHandler {
        let limiter = Arc::new(RateLimiter::new(max_calls, Duration::from_secs(1800)));
        RequestHandler::new(fake.clone(), limiter)
    }

    #[tokio::test]
    async fn upload_is_encoded_and_typed() {
        let fake = FakeExtractor::answering(|| Ok("STOP".into()));
        let handler = handler(&fake, 5);

        let text = handler.handle_upload("sign.PNG", b"hello").await.unwrap();
        assert_eq!(text, "STOP");

        let seen = fake.seen.lock().unwrap();
        assert_eq!(seen[0].data, "aGVsbG8=");
        assert_eq!(seen[0].media_type.as_str(), "image/png");
    }

    #[tokio::test]
    async fn sixth_call_gets_rate_limit_message() {
        let fake = FakeExtractor::answering(|| Ok("text".into()));
        let handler = handler(&fake, 5);

        for _ in 0..5 {
            assert_eq!(handler.handle_upload("a.jpg", b"x").await.unwrap(), "text");
        }
        let err = handler.handle_upload("a.jpg", b"x").await.unwrap_err();
        assert!(matches!(err, ExtractError::RateLimited(_)));
        assert_eq!(err.user_message(), RATE_LIMIT_MESSAGE);
        assert_eq!(fake.calls(), 5);
    }

    #[tokio::test]
    async fn unsupported_format_does_not_spend_quota() {
        let fake = FakeExtractor::answering(|| Ok("text".into()));
        let handler = handler(&fake, 1);

        let err = handler.handle_upload("anim.gif", b"GIF89a").await.unwrap_err();
        assert!(matches!(err, ExtractError::Media(MediaError::UnsupportedFormat(_))));
        assert_eq!(fake.calls(), 0);
        assert_eq!(handler.limiter().remaining(Instant::now()), 1);
    }

    #[tokio::test]
    async fn failed_call_still_counts_against_quota() {
        let fake = FakeExtractor::answering(|| Err(InferenceError::MalformedResponse("no marker".into())));
        let handler = handler(&fake, 1);

        let first = handler.handle_upload("a.png", b"x").await.unwrap_err();
        assert!(matches!(first, ExtractError::Inference(InferenceError::MalformedResponse(_))));
        let second = handler.handle_upload("a.png", b"x").await.unwrap_err();
        assert!(matches!(second, ExtractError::RateLimited(_)));
    }

    #[tokio::test]
    async fn handle_turns_every_failure_into_text() {
        let fake = FakeExtractor::answering(|| Ok("PARKING".into()));
        let handler = handler(&fake, 5);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing-upload.jpg");
        assert!(handler.handle(&missing).await.starts_with("Could not read the image"));

        let gif = Path::new("/tmp/whatever.gif");
        assert!(handler.handle(gif).await.contains("whatever.gif"));

        let path = dir.path().join("sign.jpg");
        std::fs::write(&path, b"\xff\xd8\xff").unwrap();
        assert_eq!(handler.handle(&path).await, "PARKING");
    }
}
