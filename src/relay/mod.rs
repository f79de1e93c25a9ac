pub mod audio;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Config, ConfigError, SynthesisBackend, VoiceSelection};
use crate::error::AppError;
use crate::upstream::{
    AllVoiceLabClient, ElevenLabsClient, OpenRouterClient, SpeechSynthesizer, TextGenerator,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationResponse {
    pub text: String,
    /// Data URI of the spoken reply, `null` in text-only mode.
    pub audio: Option<String>,
}

struct SpeechStage {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: VoiceSelection,
}

/// Prompt in, generated text (and optionally its speech) out. Each stage
/// waits on the previous one and the first failure ends the request.
pub struct RelayPipeline {
    generator: Arc<dyn TextGenerator>,
    speech: Option<SpeechStage>,
    call_timeout: Duration,
}

impl RelayPipeline {
    /// Text-only pipeline.
    pub fn new(generator: Arc<dyn TextGenerator>, call_timeout: Duration) -> Self {
        Self {
            generator,
            speech: None,
            call_timeout,
        }
    }

    pub fn with_speech(
        mut self,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice: VoiceSelection,
    ) -> Self {
        self.speech = Some(SpeechStage { synthesizer, voice });
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let generator = Arc::new(OpenRouterClient::new(http.clone(), &config.generation));
        let mut pipeline = Self::new(generator, config.upstream_timeout);

        if let Some(synthesis) = &config.synthesis {
            let synthesizer: Arc<dyn SpeechSynthesizer> = match synthesis.backend {
                SynthesisBackend::AllVoiceLab => Arc::new(AllVoiceLabClient::new(http, synthesis)),
                SynthesisBackend::ElevenLabs => Arc::new(ElevenLabsClient::new(http, synthesis)),
            };
            pipeline = pipeline.with_speech(synthesizer, synthesis.voice.clone());
        }

        Ok(pipeline)
    }

    pub fn is_text_only(&self) -> bool {
        self.speech.is_none()
    }

    #[tracing::instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub async fn handle(&self, prompt: &str) -> Result<ConversationResponse, AppError> {
        // 1. Validate input
        if prompt.is_empty() {
            return Err(AppError::InvalidInput("Prompt is required".into()));
        }

        // 2. Every collaborator we are about to call needs credentials
        self.check_credentials()?;

        // 3. Generate the reply text
        let text = self
            .bounded(self.generator.name(), self.generator.generate_text(prompt))
            .await?;
        if text.is_empty() {
            return Err(AppError::UpstreamEmptyResponse {
                service: self.generator.name(),
            });
        }
        tracing::debug!(text_len = text.len(), "Generated reply");

        let Some(speech) = &self.speech else {
            return Ok(ConversationResponse { text, audio: None });
        };

        // 4. Pick a voice
        let voice_id = self.select_voice(speech).await?;

        // 5. Synthesize
        let name = speech.synthesizer.name();
        let audio = self
            .bounded(name, speech.synthesizer.synthesize_speech(&text, &voice_id))
            .await?;
        tracing::debug!(bytes = audio.bytes.len(), voice = %voice_id, "Synthesized reply");

        // 6. Inline as a data URI
        Ok(ConversationResponse {
            text,
            audio: Some(audio::to_data_uri(&audio)),
        })
    }

    fn check_credentials(&self) -> Result<(), AppError> {
        if !self.generator.is_configured() {
            return Err(AppError::Configuration(format!(
                "{} credentials are not configured",
                self.generator.name()
            )));
        }
        if let Some(speech) = &self.speech {
            if !speech.synthesizer.is_configured() {
                return Err(AppError::Configuration(format!(
                    "{} credentials are not configured",
                    speech.synthesizer.name()
                )));
            }
        }
        Ok(())
    }

    async fn select_voice(&self, speech: &SpeechStage) -> Result<String, AppError> {
        let configured = match &speech.voice {
            VoiceSelection::Fixed(id) => return Ok(id.clone()),
            VoiceSelection::Verified(id) => Some(id),
            VoiceSelection::FirstAvailable => None,
        };

        let name = speech.synthesizer.name();
        let voices = self.bounded(name, speech.synthesizer.list_voices()).await?;
        tracing::debug!(count = voices.len(), "Listed voices");

        match (configured, voices.into_iter().next()) {
            (_, None) => Err(AppError::NoVoiceAvailable { service: name }),
            (Some(id), Some(_)) => Ok(id.clone()),
            (None, Some(first)) => Ok(first),
        }
    }

    async fn bounded<T, F>(&self, service: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| AppError::UpstreamTimeout { service })?
    }
}
