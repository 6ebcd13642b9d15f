//! OpenAI-compatible model backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks
//! AI, and any endpoint exposing `/v1/chat/completions`.
//!
//! Supports chat completions and embeddings. There is deliberately no
//! retry logic: failures surface to the turn boundary, and the HTTP
//! client carries an explicit timeout so a stuck endpoint cannot hang a
//! turn forever.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use souschef_core::error::ModelError;
use souschef_core::model::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, Usage,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Default request timeout. Callers wanting a tighter bound pass their
/// own via [`OpenAiCompatModel::with_timeout`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// An OpenAI-compatible LLM backend.
pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    /// Create a new OpenAI-compatible backend with the default timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a backend with an explicit request timeout.
    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter backend (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI backend (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama backend (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert our prompt entries to the OpenAI wire format.
    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn check_status(status: u16, body: String) -> Result<String, ModelError> {
        match status {
            200 => Ok(body),
            429 => Err(ModelError::RateLimited {
                retry_after_secs: 5,
            }),
            401 | 403 => Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            404 => Err(ModelError::ModelNotFound(body)),
            _ => {
                warn!(status, body = %body, "Provider returned error");
                Err(ModelError::ApiError {
                    status_code: status,
                    message: body,
                })
            }
        }
    }

    fn map_send_error(e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout(e.to_string())
        } else {
            ModelError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.config.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.config.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(
            backend = %self.name,
            model = %request.config.model,
            entries = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let text = Self::check_status(status, text)?;

        let api_response: ApiResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            usage,
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ModelError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });

        debug!(
            backend = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let text = Self::check_status(status, text)?;

        let api_resp: EmbeddingApiResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        let embeddings = api_resp.data.into_iter().map(|d| d.embedding).collect();
        let usage = api_resp.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: 0,
            total_tokens: u.total_tokens,
        });

        Ok(EmbeddingResponse {
            embeddings,
            model: api_resp.model,
            usage,
        })
    }

    async fn health_check(&self) -> Result<bool, ModelError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    model: String,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingDatum>,
    model: String,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use souschef_core::model::ChatRole;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let model = OpenAiCompatModel::new("test", "http://localhost:8000/v1/", "key");
        assert_eq!(model.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn convenience_constructors_name_themselves() {
        assert_eq!(OpenAiCompatModel::openrouter("k").name(), "openrouter");
        assert_eq!(OpenAiCompatModel::openai("k").name(), "openai");
        assert_eq!(OpenAiCompatModel::ollama(None).name(), "ollama");
    }

    #[test]
    fn prompt_entries_map_to_wire_roles() {
        let messages = vec![
            ChatMessage::system("rules"),
            ChatMessage::user("question"),
            ChatMessage::assistant("answer"),
        ];
        let api = OpenAiCompatModel::to_api_messages(&messages);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
        assert_eq!(api[1].content, "question");
        assert_eq!(messages[0].role, ChatRole::System);
    }

    #[test]
    fn status_mapping() {
        assert!(OpenAiCompatModel::check_status(200, "ok".into()).is_ok());
        assert!(matches!(
            OpenAiCompatModel::check_status(429, String::new()),
            Err(ModelError::RateLimited { .. })
        ));
        assert!(matches!(
            OpenAiCompatModel::check_status(401, String::new()),
            Err(ModelError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            OpenAiCompatModel::check_status(500, "boom".into()),
            Err(ModelError::ApiError {
                status_code: 500,
                ..
            })
        ));
    }

    #[test]
    fn response_parsing() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Here is a recipe"}}],
            "model": "gpt-4o-mini",
            "usage": {"prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Here is a recipe")
        );
        assert_eq!(parsed.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn embedding_response_parsing() {
        let json = r#"{
            "data": [{"embedding": [0.1, 0.2, 0.3]}],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].embedding.len(), 3);
    }
}
