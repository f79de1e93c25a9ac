//! Service configuration, read once from the environment at startup.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-3.5-turbo";
const DEFAULT_ALLVOICELAB_URL: &str = "https://api.allvoicelab.com/v1";
const DEFAULT_ALLVOICELAB_MODEL: &str = "tts-multilingual";
const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_multilingual_v2";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("TTS backend '{backend}' cannot list voices; use TTS_VOICE_SELECTION=fixed")]
    ListingUnsupported { backend: &'static str },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub synthesis: Option<SynthesisConfig>,
    pub upstream_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Allowed CORS origins; a single `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisBackend {
    AllVoiceLab,
    ElevenLabs,
}

impl SynthesisBackend {
    pub fn name(&self) -> &'static str {
        match self {
            SynthesisBackend::AllVoiceLab => "allvoicelab",
            SynthesisBackend::ElevenLabs => "elevenlabs",
        }
    }

    fn supports_listing(&self) -> bool {
        matches!(self, SynthesisBackend::AllVoiceLab)
    }
}

/// How the synthesis voice is picked for each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSelection {
    /// Use the configured voice without asking the backend.
    Fixed(String),
    /// List voices first and fail if there are none, then use the configured
    /// voice. The configured id is not looked up in the listing.
    Verified(String),
    /// List voices and use the first one.
    FirstAvailable,
}

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub backend: SynthesisBackend,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_id: String,
    pub voice: VoiceSelection,
    pub voice_language: String,
    pub voice_gender: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = match get("HOST") {
            Some(value) => value.parse::<IpAddr>().map_err(|e| {
                ConfigError::Invalid {
                    var: "HOST",
                    value,
                    reason: e.to_string(),
                }
            })?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let port = parse_or("PORT", get("PORT"), 5000u16)?;
        let timeout_secs = parse_or("UPSTREAM_TIMEOUT_SECS", get("UPSTREAM_TIMEOUT_SECS"), 30u64)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "UPSTREAM_TIMEOUT_SECS",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let cors_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let generation = GenerationConfig {
            api_key: get("OPENROUTER_API_KEY"),
            base_url: get("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_URL.to_string()),
            model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
        };

        let backend = match get("TTS_BACKEND").as_deref() {
            None | Some("allvoicelab") => Some(SynthesisBackend::AllVoiceLab),
            Some("elevenlabs") => Some(SynthesisBackend::ElevenLabs),
            Some("none") => None,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "TTS_BACKEND",
                    value: other.to_string(),
                    reason: "expected allvoicelab, elevenlabs or none".into(),
                })
            }
        };

        let synthesis = match backend {
            Some(backend) => Some(synthesis_config(backend, &get)?),
            None => None,
        };

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                cors_origins,
            },
            generation,
            synthesis,
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Names of the credential variables that are required but unset.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.generation.api_key.is_none() {
            missing.push("OPENROUTER_API_KEY");
        }
        if let Some(synthesis) = &self.synthesis {
            if synthesis.api_key.is_none() {
                missing.push(match synthesis.backend {
                    SynthesisBackend::AllVoiceLab => "ALLVOICELAB_API_KEY",
                    SynthesisBackend::ElevenLabs => "ELEVENLABS_API_KEY",
                });
            }
        }
        missing
    }
}

fn synthesis_config<G>(backend: SynthesisBackend, get: &G) -> Result<SynthesisConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let (key_var, url_var, default_url, default_model) = match backend {
        SynthesisBackend::AllVoiceLab => (
            "ALLVOICELAB_API_KEY",
            "ALLVOICELAB_BASE_URL",
            DEFAULT_ALLVOICELAB_URL,
            DEFAULT_ALLVOICELAB_MODEL,
        ),
        SynthesisBackend::ElevenLabs => (
            "ELEVENLABS_API_KEY",
            "ELEVENLABS_BASE_URL",
            DEFAULT_ELEVENLABS_URL,
            DEFAULT_ELEVENLABS_MODEL,
        ),
    };

    let voice_id = get("TTS_VOICE_ID");
    if let Some(id) = &voice_id {
        // Some backends put the id in the request path.
        if id.contains(['/', '?', '#']) {
            return Err(ConfigError::Invalid {
                var: "TTS_VOICE_ID",
                value: id.clone(),
                reason: "must not contain '/', '?' or '#'".into(),
            });
        }
    }
    let strategy = get("TTS_VOICE_SELECTION").unwrap_or_else(|| {
        if backend.supports_listing() {
            "verified".to_string()
        } else {
            "fixed".to_string()
        }
    });

    let voice = match strategy.as_str() {
        "fixed" => VoiceSelection::Fixed(voice_id.ok_or(ConfigError::Missing("TTS_VOICE_ID"))?),
        "verified" => {
            VoiceSelection::Verified(voice_id.ok_or(ConfigError::Missing("TTS_VOICE_ID"))?)
        }
        "first-available" => VoiceSelection::FirstAvailable,
        _ => {
            return Err(ConfigError::Invalid {
                var: "TTS_VOICE_SELECTION",
                value: strategy.clone(),
                reason: "expected fixed, verified or first-available".into(),
            })
        }
    };

    if !matches!(voice, VoiceSelection::Fixed(_)) && !backend.supports_listing() {
        return Err(ConfigError::ListingUnsupported {
            backend: backend.name(),
        });
    }

    Ok(SynthesisConfig {
        backend,
        api_key: get(key_var),
        base_url: get(url_var).unwrap_or_else(|| default_url.to_string()),
        model_id: get("TTS_MODEL_ID").unwrap_or_else(|| default_model.to_string()),
        voice,
        voice_language: get("TTS_VOICE_LANGUAGE").unwrap_or_else(|| "en".to_string()),
        voice_gender: get("TTS_VOICE_GENDER").unwrap_or_else(|| "male".to_string()),
    })
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
