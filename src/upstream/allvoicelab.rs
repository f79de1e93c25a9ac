use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use serde_json::Value;

use super::{check_status, endpoint, parse_body, AudioFormat, SpeechSynthesizer, SynthesizedAudio};
use crate::config::SynthesisConfig;
use crate::error::AppError;

const SERVICE: &str = "AllVoiceLab";
const API_KEY_HEADER: &str = "ai-api-key";

#[derive(Debug, Serialize)]
struct CreateSpeechRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    model_id: &'a str,
}

/// AllVoiceLab client: voice listing plus text-to-speech.
pub struct AllVoiceLabClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model_id: String,
    language_code: String,
    gender: String,
}

impl AllVoiceLabClient {
    pub fn new(http: Client, config: &SynthesisConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model_id: config.model_id.clone(),
            language_code: config.voice_language.clone(),
            gender: config.voice_gender.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("ALLVOICELAB_API_KEY is not set".into()))
    }
}

#[async_trait]
impl SpeechSynthesizer for AllVoiceLabClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn list_voices(&self) -> Result<Vec<String>, AppError> {
        let response = self
            .http
            .get(endpoint(&self.base_url, "voices/get_all_voices"))
            .header(API_KEY_HEADER, self.api_key()?)
            .query(&[
                ("show_legacy", "true"),
                ("language_code", self.language_code.as_str()),
                ("gender", self.gender.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        let response = check_status(SERVICE, response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        Ok(voice_ids(&body))
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, AppError> {
        let request = CreateSpeechRequest {
            text,
            voice_id,
            model_id: &self.model_id,
        };

        let response = self
            .http
            .post(endpoint(&self.base_url, "text-to-speech/create"))
            .header(API_KEY_HEADER, self.api_key()?)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        let response = check_status(SERVICE, response).await?;
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::from_reqwest(SERVICE, e))?;

        // The service reports some failures as a JSON body with a 200 status.
        if is_json {
            return Err(AppError::Upstream {
                service: SERVICE,
                status: None,
                message: "expected audio, got a JSON response".into(),
                body: parse_body(&bytes),
            });
        }

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            format: AudioFormat::Mpeg,
        })
    }
}

/// Voice identifiers from a listing body. Accepts `data.voices`, `voices` or
/// a bare `data` array, with ids under `voice_id` or `id`.
fn voice_ids(body: &Value) -> Vec<String> {
    let voices = body
        .pointer("/data/voices")
        .or_else(|| body.get("voices"))
        .or_else(|| body.get("data"))
        .and_then(Value::as_array);

    let Some(voices) = voices else {
        tracing::debug!("No voice list found in {} response: {}", SERVICE, body);
        return Vec::new();
    };

    let ids: Vec<String> = voices
        .iter()
        .filter_map(|voice| voice.get("voice_id").or_else(|| voice.get("id")))
        .filter_map(|id| match id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    tracing::debug!("{} offers {} voice(s): {:?}", SERVICE, ids.len(), ids);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SynthesisBackend, VoiceSelection};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AllVoiceLabClient {
        AllVoiceLabClient::new(
            Client::new(),
            &SynthesisConfig {
                backend: SynthesisBackend::AllVoiceLab,
                api_key: Some("avl-key".into()),
                base_url: server.uri(),
                model_id: "tts-multilingual".into(),
                voice: VoiceSelection::Verified("280800998262308871".into()),
                voice_language: "en".into(),
                voice_gender: "male".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_list_voices_sends_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/voices/get_all_voices"))
            .and(header("ai-api-key", "avl-key"))
            .and(query_param("show_legacy", "true"))
            .and(query_param("language_code", "en"))
            .and(query_param("gender", "male"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": 200,
                "data": { "voices": [
                    { "voice_id": "280800998262308871", "name": "Kevin" },
                    { "voice_id": "280800998262308872", "name": "Alex" }
                ] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let voices = client(&server).list_voices().await.unwrap();
        assert_eq!(voices, vec!["280800998262308871", "280800998262308872"]);
    }

    #[tokio::test]
    async fn test_list_voices_error_status_propagates() {
        let server = MockServer::start().await;
        let error_body = json!({ "status_code": 403, "message": "api key has no access" });
        Mock::given(method("GET"))
            .and(path("/voices/get_all_voices"))
            .respond_with(ResponseTemplate::new(403).set_body_json(error_body.clone()))
            .mount(&server)
            .await;

        match client(&server).list_voices().await.unwrap_err() {
            AppError::Upstream { status, body, .. } => {
                assert_eq!(status, Some(403));
                assert_eq!(body, Some(error_body));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_synthesize_returns_raw_audio() {
        let server = MockServer::start().await;
        let audio = vec![0x49, 0x44, 0x33, 0x04, 0x00];
        Mock::given(method("POST"))
            .and(path("/text-to-speech/create"))
            .and(header("ai-api-key", "avl-key"))
            .and(body_json(json!({
                "text": "Hi there",
                "voice_id": "280800998262308871",
                "model_id": "tts-multilingual"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "audio/mpeg")
                    .set_body_bytes(audio.clone()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .synthesize_speech("Hi there", "280800998262308871")
            .await
            .unwrap();
        assert_eq!(result.bytes, audio);
        assert_eq!(result.format, AudioFormat::Mpeg);
    }

    #[tokio::test]
    async fn test_synthesize_error_status_propagates() {
        let server = MockServer::start().await;
        let error_body = json!({ "message": "invalid voice_id" });
        Mock::given(method("POST"))
            .and(path("/text-to-speech/create"))
            .respond_with(ResponseTemplate::new(422).set_body_json(error_body.clone()))
            .mount(&server)
            .await;

        match client(&server).synthesize_speech("Hi", "nope").await.unwrap_err() {
            AppError::Upstream { status, body, .. } => {
                assert_eq!(status, Some(422));
                assert_eq!(body, Some(error_body));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_json_body_with_ok_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/create"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status_code": 401, "message": "invalid api key" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).synthesize_speech("Hi", "v").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: None, body: Some(_), .. }));
    }

    #[test]
    fn test_voice_ids_shapes() {
        assert_eq!(
            voice_ids(&json!({ "voices": [{ "voice_id": "a" }, { "id": "b" }] })),
            vec!["a", "b"]
        );
        assert_eq!(voice_ids(&json!({ "data": [{ "voice_id": 42 }] })), vec!["42"]);
        assert!(voice_ids(&json!({ "data": { "voices": [] } })).is_empty());
        assert!(voice_ids(&json!({ "message": "ok" })).is_empty());
    }
}
