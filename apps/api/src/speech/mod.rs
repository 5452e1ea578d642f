//! Speech synthesis boundary.
//!
//! The avatar's turns are spoken aloud; this module turns a Thai message
//! into MP3 bytes via Google Cloud TTS. Recognition of the respondent's
//! voice happens client-side, so the server never sees audio input — the
//! orchestrator is agnostic to whether a turn's text was typed or
//! transcribed.

pub mod handlers;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const TTS_API_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Voices to try in order of preference: premium neural voice first, then
/// the standard voice that is always available.
const VOICE_PREFERENCES: [&str; 2] = ["th-TH-Neural2-C", "th-TH-Standard-A"];

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech synthesis is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("TTS returned no audio content")]
    EmptyAudio,

    #[error("TTS audio content is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

#[async_trait]
pub trait SpeechClient: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError>;
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    input: TtsInput<'a>,
    voice: TtsVoice<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: TtsAudioConfig,
}

#[derive(Debug, Serialize)]
struct TtsInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct TtsVoice<'a> {
    #[serde(rename = "languageCode")]
    language_code: &'a str,
    name: &'a str,
    #[serde(rename = "ssmlGender")]
    ssml_gender: &'a str,
}

#[derive(Debug, Serialize)]
struct TtsAudioConfig {
    #[serde(rename = "audioEncoding")]
    audio_encoding: &'static str,
    /// Slightly slower than default for clarity.
    #[serde(rename = "speakingRate")]
    speaking_rate: f32,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    #[serde(rename = "audioContent")]
    audio_content: Option<String>,
}

/// Google Cloud TTS client. Constructed with `None` when no API key is
/// configured, in which case every call reports `NotConfigured` instead of
/// panicking at startup — the rest of the assessment flow works without it.
pub struct GoogleTts {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleTts {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    async fn synthesize_with_voice(
        &self,
        api_key: &str,
        text: &str,
        voice: &str,
    ) -> Result<Bytes, SpeechError> {
        let url = format!("{TTS_API_URL}?key={api_key}");
        let payload = TtsRequest {
            input: TtsInput { text },
            voice: TtsVoice {
                language_code: "th-TH",
                name: voice,
                ssml_gender: "FEMALE",
            },
            audio_config: TtsAudioConfig {
                audio_encoding: "MP3",
                speaking_rate: 0.95,
            },
        };

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let tts: TtsResponse = response.json().await?;
        let encoded = tts.audio_content.ok_or(SpeechError::EmptyAudio)?;
        Ok(Bytes::from(BASE64.decode(encoded)?))
    }
}

#[async_trait]
impl SpeechClient for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        let api_key = self.api_key.as_deref().ok_or(SpeechError::NotConfigured)?;

        // Neural voice first; on failure (commonly billing), retry once with
        // the standard voice before giving up.
        match self
            .synthesize_with_voice(api_key, text, VOICE_PREFERENCES[0])
            .await
        {
            Ok(audio) => Ok(audio),
            Err(first_error) => {
                warn!(%first_error, "Premium voice failed, retrying with standard voice");
                self.synthesize_with_voice(api_key, text, VOICE_PREFERENCES[1])
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_reports_not_configured() {
        let tts = GoogleTts::new(None);
        let err = tts.synthesize("สวัสดีค่ะ").await.unwrap_err();
        assert!(matches!(err, SpeechError::NotConfigured));
    }

    #[test]
    fn test_request_payload_shape() {
        let payload = TtsRequest {
            input: TtsInput { text: "สวัสดีค่ะ" },
            voice: TtsVoice {
                language_code: "th-TH",
                name: VOICE_PREFERENCES[0],
                ssml_gender: "FEMALE",
            },
            audio_config: TtsAudioConfig {
                audio_encoding: "MP3",
                speaking_rate: 0.95,
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["voice"]["languageCode"], "th-TH");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(json["input"]["text"], "สวัสดีค่ะ");
    }
}
