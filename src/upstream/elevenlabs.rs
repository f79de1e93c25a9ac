use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;

use super::{check_status, endpoint, AudioFormat, SpeechSynthesizer, SynthesizedAudio};
use crate::config::SynthesisConfig;
use crate::error::AppError;

const SERVICE: &str = "ElevenLabs";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Synthesis-only backend; the voice always comes from configuration.
pub struct ElevenLabsClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model_id: String,
}

impl ElevenLabsClient {
    pub fn new(http: Client, config: &SynthesisConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model_id: config.model_id.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("ELEVENLABS_API_KEY is not set".into()))?;

        let response = self
            .http
            .post(endpoint(
                &self.base_url,
                &format!("text-to-speech/{}", voice_id),
            ))
            .header("xi-api-key", api_key)
            .header(header::ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        let response = check_status(SERVICE, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            format: AudioFormat::Mp3,
        })
    }
}
