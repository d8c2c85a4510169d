use serde::{Deserialize, Serialize};

use crate::media::EncodedImage;

// Messages API request format
#[derive(Serialize, Debug)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

#[derive(Serialize, Debug)]
pub struct Message {
    pub role: &'static str,
    pub content: Vec<RequestBlock>,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Serialize, Debug)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub media_type: &'static str,
    pub data: String,
}

impl MessagesRequest {
    // Single user turn: the image first, then the instruction
    pub fn image_with_prompt(model: &str, max_tokens: u32, image: &EncodedImage, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![
                    RequestBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: image.media_type.as_str(),
                            data: image.data.clone(),
                        },
                    },
                    RequestBlock::Text { text: prompt.to_string() },
                ],
            }],
        }
    }
}

// Messages API response format, only the parts we read
#[derive(Deserialize, Debug)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
}

#[derive(Deserialize, Debug)]
pub struct ResponseBlock {
    #[serde(default)]
    pub text: Option<String>,
}

impl MessagesResponse {
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(|block| block.text.as_deref())
    }
}

// Body returned by POST /api/extract
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractResponse {
    Text(String),
    Error(String),
}
