use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CollaboratorError, ensure_success};
use crate::providers::non_empty;

const SERVICE: &str = "anthropic";

pub const DEFAULT_ANTHROPIC_BASE: &str = "https://api.anthropic.com";
pub const DEFAULT_TEXT_MODEL: &str = "claude-sonnet-4-5";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    /// Falls back to the generator's configured prompt when `None`.
    pub system_prompt: Option<String>,
    pub message: String,
    pub max_tokens: Option<u32>,
}

impl TextRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            system_prompt: None,
            message: message.into(),
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Full reply text, batched rather than streamed.
    async fn generate(
        &self,
        request: TextRequest,
    ) -> Result<String, CollaboratorError>;
}

pub struct AnthropicText {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    system_prompt: Option<String>,
}

impl fmt::Debug for AnthropicText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicText")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AnthropicText {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
        max_tokens: u32,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: non_empty(base_url)
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: non_empty(api_key),
            model: non_empty(model)
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            max_tokens,
            system_prompt: non_empty(system_prompt),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

fn reply_text(response: MessagesResponse) -> Option<String> {
    let text = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl TextGenerator for AnthropicText {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        request: TextRequest,
    ) -> Result<String, CollaboratorError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CollaboratorError::NotConfigured { service: SERVICE });
        };

        let system = request
            .system_prompt
            .as_deref()
            .or(self.system_prompt.as_deref());
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            system,
            messages: [Message {
                role: "user",
                content: &request.message,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|source| CollaboratorError::Network {
                service: SERVICE,
                source,
            })?;

        let response = match ensure_success(SERVICE, response).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    model = %self.model,
                    error = %err,
                    "text generation failed"
                );
                return Err(err);
            }
        };

        let parsed: MessagesResponse =
            response.json().await.map_err(|err| CollaboratorError::Decode {
                service: SERVICE,
                message: err.to_string(),
            })?;

        let text = reply_text(parsed)
            .ok_or(CollaboratorError::Empty { service: SERVICE })?;
        debug!(model = %self.model, chars = text.len(), "text generated");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "t", "name": "x", "input": {}},
                {"type": "text", "text": "there."}
            ]
        }))
        .unwrap();
        assert_eq!(reply_text(response).as_deref(), Some("Hello there."));
    }

    #[test]
    fn blank_reply_is_empty() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "  "}]
        }))
        .unwrap();
        assert!(reply_text(response).is_none());
    }

    #[test]
    fn request_prefers_caller_prompt() {
        let request = TextRequest::new("hi")
            .with_system_prompt(Some("You are Ada.".into()));
        let body = MessagesRequest {
            model: DEFAULT_TEXT_MODEL,
            max_tokens: 300,
            system: request.system_prompt.as_deref(),
            messages: [Message {
                role: "user",
                content: &request.message,
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["system"], "You are Ada.");
        assert_eq!(value["messages"][0]["content"], "hi");
    }
}
