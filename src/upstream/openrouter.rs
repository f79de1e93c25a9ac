use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_status, endpoint, TextGenerator};
use crate::config::GenerationConfig;
use crate::error::AppError;

const SERVICE: &str = "OpenRouter";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completion client for OpenRouter (OpenAI-compatible wire format).
pub struct OpenRouterClient {
    http: Client,
    api_key: Option<String>,
    url: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(http: Client, config: &GenerationConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            url: endpoint(&config.base_url, "chat/completions"),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("OPENROUTER_API_KEY is not set".into()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        let response = check_status(SERVICE, response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        extract_content(body)
    }
}

/// Pulls the first choice's text out of a completion body. A 200 body that
/// carries an `error` object is reported as an upstream failure.
fn extract_content(body: Value) -> Result<String, AppError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let status = error
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .filter(|c| (400..600).contains(c));
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("error returned in completion body")
            .to_string();
        return Err(AppError::Upstream {
            service: SERVICE,
            status,
            message,
            body: Some(body),
        });
    }

    let parsed: ChatResponse = serde_json::from_value(body).map_err(|e| AppError::Upstream {
        service: SERVICE,
        status: None,
        message: format!("Unexpected completion format: {}", e),
        body: None,
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty())
        .ok_or(AppError::UpstreamEmptyResponse { service: SERVICE })
}
