use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::upstream::SynthesizedAudio;

/// Inlines synthesized audio as `data:<mime>;base64,<payload>`.
pub fn to_data_uri(audio: &SynthesizedAudio) -> String {
    format!(
        "data:{};base64,{}",
        audio.format.mime_type(),
        STANDARD.encode(&audio.bytes)
    )
}
