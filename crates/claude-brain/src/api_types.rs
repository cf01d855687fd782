//! Anthropic Messages API request and response types.

use serde::{Deserialize, Serialize};

/// A message in the request body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage {
    /// Role: "user" or "assistant"
    pub role: String,
    /// Message content
    pub content: String,
}

/// Messages API request.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model to use
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
    /// System instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Messages in the conversation
    pub messages: Vec<ApiMessage>,
}

/// Messages API response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    /// Response ID
    pub id: String,
    /// Model used
    pub model: String,
    /// Content blocks
    pub content: Vec<ContentBlock>,
    /// Why generation stopped
    pub stop_reason: Option<String>,
    /// Token usage
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    /// Concatenate all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A response content block. Only text blocks are used.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetails,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetails {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_text_blocks() {
        let json = r#"{
            "id": "msg_1",
            "model": "claude",
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "x", "name": "y", "input": {}},
                {"type": "text", "text": "there"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 2}
        }"#;

        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "Hello there");
    }

    #[test]
    fn test_request_omits_missing_system() {
        let request = MessagesRequest {
            model: "m".to_string(),
            max_tokens: 10,
            temperature: 0.0,
            system: None,
            messages: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }
}
