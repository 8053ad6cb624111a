//! Client for an OpenAI-compatible chat and embeddings API.
//!
//! Every model interaction goes through a [`Prompt`]: its functions become
//! the request's tools, and a prompt with exactly one function forces the
//! model to call it.

use std::time::Duration;

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ModelSettings;
use crate::error::ModelError;
use crate::prompts::{FunctionDef, Prompt};

const MAX_RETRIES: u32 = 2;

/// Text or multi-part message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as sent by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// One message of a conversation, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(MessageContent::Text(text.into())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// A user message carrying a PNG screenshot after the text.
    pub fn user_with_image(text: impl Into<String>, png: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        Self {
            role: "user".to_string(),
            content: Some(MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{encoded}"),
                    },
                },
            ])),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// The result of one tool call, answered back to the model.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(MessageContent::Text(content.into())),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Concatenated text content.
    pub fn text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether the text content mentions `word`, ignoring case.
    pub fn says(&self, word: &str) -> bool {
        self.text().to_lowercase().contains(&word.to_lowercase())
    }
}

/// Decode the arguments of the first call to `tool`.
pub fn tool_arguments<T: DeserializeOwned>(message: &ChatMessage, tool: &str) -> Result<T, ModelError> {
    let call = message
        .tool_calls
        .iter()
        .find(|c| c.function.name == tool)
        .ok_or_else(|| ModelError::MissingToolCall(tool.to_string()))?;
    serde_json::from_str(&call.function.arguments).map_err(|source| ModelError::BadArguments {
        tool: tool.to_string(),
        source,
    })
}

#[derive(Debug, Serialize)]
struct ToolDef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionDef,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP client for chat completions and embeddings.
#[derive(Clone)]
pub struct ModelClient {
    client: reqwest::Client,
    settings: ModelSettings,
}

impl ModelClient {
    pub fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Send a conversation with the prompt's tools and settings.
    pub async fn chat(&self, prompt: &Prompt, messages: &[ChatMessage]) -> Result<ChatMessage, ModelError> {
        let tools = prompt
            .functions
            .iter()
            .map(|function| ToolDef {
                kind: "function",
                function,
            })
            .collect();
        let tool_choice = prompt.forced_tool().map(|name| {
            serde_json::json!({ "type": "function", "function": { "name": name } })
        });
        let body = ChatCompletionRequest {
            model: &prompt.model,
            messages,
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            tools,
            tool_choice,
        };

        let response: ChatCompletionResponse = self.post("chat/completions", &body).await?;
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(ModelError::NoChoices)?;
        tracing::debug!(
            model = %prompt.model,
            tool_calls = message.tool_calls.len(),
            "chat completion received"
        );
        Ok(message)
    }

    /// Render `prompt` with `data` and send it as a single user message.
    pub async fn ask(
        &self,
        prompt: &Prompt,
        data: &[(&str, &str)],
        screenshot: Option<&[u8]>,
    ) -> Result<ChatMessage, ModelError> {
        let text = prompt.render(data);
        let message = match screenshot {
            Some(png) => ChatMessage::user_with_image(text, png),
            None => ChatMessage::user(text),
        };
        self.chat(prompt, &[message]).await
    }

    /// Embedding vector of `text`.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let body = EmbeddingRequest {
            model: &self.settings.embedding_model,
            input: text,
        };
        let response: EmbeddingResponse = self.post("embeddings", &body).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or(ModelError::EmptyEmbedding)
    }

    /// POST JSON with retry on 5xx and transport errors and backoff on 429.
    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, ModelError> {
        let url = format!("{}/{path}", self.settings.api_base.trim_end_matches('/'));
        let mut retries = 0u32;

        loop {
            let sent = self
                .client
                .post(&url)
                .bearer_auth(&self.settings.api_key)
                .json(body)
                .send()
                .await;

            let response = match sent {
                Ok(r) => r,
                Err(e) if retries < MAX_RETRIES => {
                    retries += 1;
                    tracing::warn!(error = %e, retries, "model request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(retries - 1))).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status().as_u16();
            if status >= 500 && retries < MAX_RETRIES {
                retries += 1;
                tracing::warn!(status, retries, "model API error, retrying");
                tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(retries - 1))).await;
                continue;
            }
            if status == 429 && retries < MAX_RETRIES {
                retries += 1;
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                tracing::warn!(retry_after, retries, "model API rate limited");
                tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                continue;
            }
            if !response.status().is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                return Err(ModelError::Status { status, body });
            }

            return Ok(response.json().await?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_with_call(name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                kind: "function".into(),
                function: FunctionCall {
                    name: name.into(),
                    arguments: arguments.into(),
                },
            }],
            tool_call_id: None,
        }
    }

    #[test]
    fn test_image_message_serializes_as_parts() {
        let msg = ChatMessage::user_with_image("look", b"png");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["content"][0], json!({"type": "text", "text": "look"}));
        assert_eq!(
            value["content"][1]["image_url"]["url"],
            json!("data:image/png;base64,cG5n")
        );
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_assistant_message_with_null_content_deserializes() {
        let raw = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "set_title", "arguments": "{\"title\":\"Home\"}"}
            }]
        });
        let msg: ChatMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.text(), "");
        assert_eq!(msg.tool_calls[0].function.name, "set_title");
    }

    #[derive(Debug, Deserialize)]
    struct Title {
        title: String,
    }

    #[test]
    fn test_tool_arguments_strict() {
        let msg = message_with_call("set_title", r#"{"title":"Home"}"#);
        let t: Title = tool_arguments(&msg, "set_title").unwrap();
        assert_eq!(t.title, "Home");

        let missing = tool_arguments::<Title>(&msg, "describe_page").unwrap_err();
        assert!(matches!(missing, ModelError::MissingToolCall(_)));

        let bad = message_with_call("set_title", r#"{"name":"Home"}"#);
        let err = tool_arguments::<Title>(&bad, "set_title").unwrap_err();
        assert!(matches!(err, ModelError::BadArguments { .. }));
    }

    #[test]
    fn test_says_ignores_case() {
        assert!(ChatMessage::user("Yes, still loading").says("yes"));
        assert!(!ChatMessage::user("No").says("yes"));
    }
}
