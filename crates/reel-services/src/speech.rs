//! Speech-synthesis service client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::{join_url, ServiceConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::video::check_status;
use crate::voice::VoiceParameters;

/// One synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub voice_id: String,
    pub text: String,
    pub stability: f64,
    pub similarity: f64,
    pub model_id: String,
}

impl SpeechRequest {
    pub fn new(
        voice_id: impl Into<String>,
        text: impl Into<String>,
        params: &VoiceParameters,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            voice_id: voice_id.into(),
            text: text.into(),
            stability: params.stability,
            similarity: params.similarity,
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `request` to encoded audio bytes (MP3).
    async fn synthesize(&self, request: &SpeechRequest) -> ServiceResult<Vec<u8>>;

    /// Model id used when callers do not pick one.
    fn default_model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

/// HTTP implementation of [`SpeechSynthesizer`].
pub struct HttpSpeechSynthesizer {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model_id: String,
}

impl HttpSpeechSynthesizer {
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self {
            http,
            base_url: config.speech_api_url.clone(),
            api_key: config.speech_api_key.clone(),
            model_id: config.speech_model_id.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> ServiceResult<Vec<u8>> {
        if request.text.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("speech text is empty".to_string()));
        }

        let url = join_url(&self.base_url, &format!("text-to-speech/{}", request.voice_id));
        let body = SynthesisBody {
            text: &request.text,
            model_id: &request.model_id,
            voice_settings: VoiceSettings {
                stability: request.stability,
                similarity_boost: request.similarity,
            },
        };

        debug!(
            voice_id = %request.voice_id,
            chars = request.text.len(),
            stability = request.stability,
            "Synthesizing speech"
        );

        let mut builder = self
            .http
            .post(&url)
            .header("accept", "audio/mpeg")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("xi-api-key", key);
        }

        let response = check_status(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ServiceError::invalid_response("empty audio body"));
        }
        Ok(bytes.to_vec())
    }

    fn default_model(&self) -> &str {
        &self.model_id
    }
}
