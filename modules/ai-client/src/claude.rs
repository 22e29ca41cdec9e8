use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AiError, Result};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Claude chat client specialized for structured extraction: the response
/// schema is forced through a tool definition so the model must emit typed
/// JSON, and the caller still re-validates the deserialized value.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| AiError::Api {
                    status: 0,
                    message: format!("invalid API key header: {e}"),
                })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, "Claude chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Malformed(e.to_string()))?;
        Ok(parsed)
    }

    /// Request a response conforming to `T`'s JSON schema. The schema is
    /// attached as a forced tool, so the model cannot answer in prose.
    pub async fn extract<T: JsonSchema + DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<T> {
        let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
        let schema = serde_json::to_value(schema)
            .map_err(|e| AiError::Malformed(format!("schema serialization: {e}")))?;

        let tool_name = "structured_response";
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            system: Some(system_prompt.to_string()),
            messages: vec![WireMessage::user(user_prompt)],
            tools: vec![ToolDefinition {
                name: tool_name.to_string(),
                description: "Report the structured analysis of the input.".to_string(),
                input_schema: schema,
            }],
            tool_choice: Some(serde_json::json!({
                "type": "tool",
                "name": tool_name,
            })),
        };

        let response = self.chat(&request).await?;

        if response.stop_reason.as_deref() == Some("refusal") {
            return Err(AiError::SafetyBlocked(
                response.text().unwrap_or_default(),
            ));
        }

        for block in &response.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return serde_json::from_value(input.clone())
                    .map_err(|e| AiError::Malformed(e.to_string()));
            }
        }

        Err(AiError::EmptyResponse)
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl WireMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

impl ChatResponse {
    fn text(&self) -> Option<String> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[allow(dead_code)]
        id: String,
        #[allow(dead_code)]
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides() {
        let claude = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001")
            .with_max_tokens(2048)
            .with_temperature(0.0);
        assert_eq!(claude.model(), "claude-haiku-4-5-20251001");
        assert_eq!(claude.max_tokens, 2048);
        assert_eq!(claude.temperature, 0.0);
    }

    #[test]
    fn response_tool_use_deserializes() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "id": "t1", "name": "structured_response",
                 "input": {"answer": 42}}
            ],
            "stop_reason": "tool_use"
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));
        match &response.content[0] {
            ContentBlock::ToolUse { input, .. } => {
                assert_eq!(input["answer"], 42);
            }
            other => panic!("expected tool_use, got {other:?}"),
        }
    }

    #[test]
    fn unknown_content_block_tolerated() {
        let json = r#"{
            "content": [{"type": "thinking", "thinking": "..."}],
            "stop_reason": "end_turn"
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(response.content[0], ContentBlock::Other));
    }

    #[test]
    fn empty_response_has_no_text() {
        let response: ChatResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(response.text().is_none());
    }
}
