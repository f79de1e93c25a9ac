pub mod allvoicelab;
pub mod elevenlabs;
pub mod openrouter;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;

pub use allvoicelab::AllVoiceLabClient;
pub use elevenlabs::ElevenLabsClient;
pub use openrouter::OpenRouterClient;

/// Audio container declared by a synthesis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mpeg,
    Mp3,
}

impl AudioFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mpeg => "audio/mpeg",
            AudioFormat::Mp3 => "audio/mp3",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Language-generation collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the credentials needed to call the service are present.
    fn is_configured(&self) -> bool;

    async fn generate_text(&self, prompt: &str) -> Result<String, AppError>;
}

/// Speech-synthesis collaborator.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    /// Identifiers of the voices the backend currently offers.
    async fn list_voices(&self) -> Result<Vec<String>, AppError> {
        Err(AppError::Configuration(format!(
            "{} does not support voice listing",
            self.name()
        )))
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, AppError>;
}

/// Passes 2xx responses through; anything else becomes an upstream error
/// carrying the status and whatever body the service sent back.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.bytes().await {
        Ok(bytes) => parse_body(&bytes),
        Err(e) => {
            tracing::warn!("Failed to read {} error body: {}", service, e);
            None
        }
    };

    Err(AppError::Upstream {
        service,
        status: Some(status.as_u16()),
        message: format!("HTTP {}", status),
        body,
    })
}

/// JSON when it parses, otherwise the raw text.
pub(crate) fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    serde_json::from_slice(bytes)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(bytes).into_owned())))
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
