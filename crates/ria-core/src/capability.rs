//! Analysis and normalization capabilities
//!
//! The engine never talks to a model directly. Leaf tasks go through an
//! [`AnalysisCapability`], the entry node through a [`TextNormalizer`]. Both
//! are injected, so tests swap in scripted fakes and production uses
//! [`ChatCompletionsClient`].

use crate::error::CapabilityError;
use crate::task::AnalysisTask;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Default OpenAI-compatible endpoint (Groq)
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Longest error body kept in a [`CapabilityError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Turns text into one task's JSON fragment
#[async_trait]
pub trait AnalysisCapability: Send + Sync {
    /// Run `task` over `text`
    async fn invoke(&self, task: &AnalysisTask, text: &str) -> Result<Value, CapabilityError>;
}

#[async_trait]
impl<C: AnalysisCapability + ?Sized> AnalysisCapability for Arc<C> {
    async fn invoke(&self, task: &AnalysisTask, text: &str) -> Result<Value, CapabilityError> {
        (**self).invoke(task, text).await
    }
}

/// Entry-node capability: rewrites the extracted text before analysis
#[async_trait]
pub trait TextNormalizer: Send + Sync {
    /// Normalize `text`
    async fn normalize(&self, text: &str) -> Result<String, CapabilityError>;

    /// Normalizer name, for logs
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<N: TextNormalizer + ?Sized> TextNormalizer for Arc<N> {
    async fn normalize(&self, text: &str) -> Result<String, CapabilityError> {
        (**self).normalize(text).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Parse model output as JSON, tolerating a fenced code block
///
/// # Errors
/// `CapabilityError::InvalidResponse` if the content is not JSON
pub fn parse_json_content(content: &str) -> Result<Value, CapabilityError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim);

    serde_json::from_str(body).map_err(|e| CapabilityError::InvalidResponse(e.to_string()))
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// OpenAI-compatible chat-completions client
///
/// One instance serves every task of every run; the wrapped
/// [`reqwest::Client`] pools connections.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsClient {
    /// Create client with default endpoint, model and temperature
    #[must_use]
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// With endpoint base URL (without `/chat/completions`)
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// With model name
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With sampling temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Model name
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system + user exchange and return the reply content
    ///
    /// # Errors
    /// - `CapabilityError::Transport` if the request fails
    /// - `CapabilityError::Status` on a non-success response
    /// - `CapabilityError::EmptyResponse` if no choice carries content
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        json_mode: bool,
    ) -> Result<String, CapabilityError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CapabilityError::EmptyResponse)
    }
}

#[async_trait]
impl AnalysisCapability for ChatCompletionsClient {
    async fn invoke(&self, task: &AnalysisTask, text: &str) -> Result<Value, CapabilityError> {
        let system = format!(
            "{}\nRespond with a single JSON object and nothing else.",
            task.instructions()
        );
        let content = self
            .complete(&system, &format!("Report text:\n{text}"), true)
            .await?;
        tracing::debug!(task = task.name(), bytes = content.len(), "chat completion received");
        parse_json_content(&content)
    }
}

/// Instruction given to [`ChatNormalizer`]
const NORMALIZE_INSTRUCTIONS: &str = "Rewrite the text so that every monetary amount is \
expressed in EUR. Convert using the given rates, expand multipliers such as m, k, bn and \
million, and write each amount with two decimals and thousands separators followed by \
' EUR' (for example 8,500,000.00 EUR). Leave all other text unchanged and return only \
the rewritten text.";

/// Entry-node normalizer backed by the chat model
#[derive(Debug, Clone)]
pub struct ChatNormalizer {
    client: Arc<ChatCompletionsClient>,
    rates: crate::normalize::ExchangeRates,
}

impl ChatNormalizer {
    /// Create normalizer using `client` and `rates`
    #[must_use]
    pub fn new(client: Arc<ChatCompletionsClient>, rates: crate::normalize::ExchangeRates) -> Self {
        Self { client, rates }
    }
}

#[async_trait]
impl TextNormalizer for ChatNormalizer {
    async fn normalize(&self, text: &str) -> Result<String, CapabilityError> {
        let system = format!(
            "{NORMALIZE_INSTRUCTIONS}\nRates to EUR: 1 EUR = {} EUR, 1 USD = {} EUR, 1 GBP = {} EUR.",
            self.rates.eur, self.rates.usd, self.rates.gbp
        );
        let converted = self.client.complete(&system, text, false).await?;
        Ok(converted.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_json() {
        let value = parse_json_content(r#"{"risks": []}"#).unwrap();
        assert_eq!(value, json!({"risks": []}));
    }

    #[test]
    fn parses_fenced_json() {
        let value = parse_json_content("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));

        let value = parse_json_content("```\n[1, 2]\n```").unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn rejects_prose() {
        let err = parse_json_content("Here is your analysis").unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidResponse(_)));
    }

    #[test]
    fn request_shape_in_json_mode() {
        let request = ChatRequest {
            model: DEFAULT_MODEL,
            temperature: DEFAULT_TEMPERATURE,
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("usr")],
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "llama-3.3-70b-versatile");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "usr");
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[test]
    fn plain_request_omits_response_format() {
        let request = ChatRequest {
            model: DEFAULT_MODEL,
            temperature: DEFAULT_TEMPERATURE,
            messages: vec![ChatMessage::user("usr")],
            response_format: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn client_builders() {
        let client = ChatCompletionsClient::new(reqwest::Client::new(), "key")
            .with_base_url("http://localhost:8000/v1/")
            .with_model("small")
            .with_temperature(0.0);

        assert_eq!(client.base_url, "http://localhost:8000/v1");
        assert_eq!(client.model(), "small");
        assert!(!format!("{client:?}").contains("key"));
    }

    #[test]
    fn long_error_bodies_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY * 2);
        let short = truncate(&body);
        assert_eq!(short.len(), MAX_ERROR_BODY + 3);
    }
}
