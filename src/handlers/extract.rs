use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use std::time::Instant;
use tracing::warn;

use crate::errors::ExtractError;
use crate::metrics::REQUEST_TOTAL;
use crate::models::ExtractResponse;
use crate::state::SharedState;

const IMAGE_FIELD: &str = "image";

pub async fn extract_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    REQUEST_TOTAL.inc();

    let (filename, bytes) = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => {
                let filename = upload_name(field.file_name(), field.content_type());
                match field.bytes().await {
                    Ok(bytes) => break (filename, bytes),
                    Err(e) => return failure(e.status(), e.body_text()),
                }
            }
            Ok(Some(_)) => continue, // ignore unknown fields
            Ok(None) => return failure(StatusCode::BAD_REQUEST, "No image provided.".to_string()),
            Err(e) => {
                warn!("Bad upload: {}", e);
                return failure(e.status(), e.body_text());
            }
        }
    };

    if bytes.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "The uploaded image is empty.".to_string());
    }

    match state.handler.handle_upload(&filename, &bytes).await {
        Ok(text) => (StatusCode::OK, HeaderMap::new(), Json(ExtractResponse::Text(text))),
        Err(e) => {
            let mut headers = HeaderMap::new();
            if let ExtractError::RateLimited(_) = e {
                let wait = state.handler.limiter().retry_after(Instant::now());
                if let Ok(value) = HeaderValue::from_str(&wait.as_secs().to_string()) {
                    headers.insert(header::RETRY_AFTER, value);
                }
            }
            (e.status_code(), headers, Json(ExtractResponse::Error(e.user_message())))
        }
    }
}

fn failure(status: StatusCode, message: String) -> (StatusCode, HeaderMap, Json<ExtractResponse>) {
    (status, HeaderMap::new(), Json(ExtractResponse::Error(message)))
}

// Pasted images arrive without a filename, so fall back to one derived from the part's content type
fn upload_name(file_name: Option<&str>, content_type: Option<&str>) -> String {
    match (file_name, content_type) {
        (Some(name), _) if !name.is_empty() => name.to_string(),
        (_, Some("image/png")) => "pasted.png".to_string(),
        (_, Some("image/jpeg")) => "pasted.jpg".to_string(),
        _ => "upload".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_name_fallbacks() {
        assert_eq!(upload_name(Some("sign.JPG"), Some("image/jpeg")), "sign.JPG");
        assert_eq!(upload_name(Some(""), Some("image/png")), "pasted.png");
        assert_eq!(upload_name(None, Some("image/jpeg")), "pasted.jpg");
        assert_eq!(upload_name(None, Some("image/gif")), "upload");
        assert_eq!(upload_name(None, None), "upload");
    }
}
