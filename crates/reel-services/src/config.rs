//! Service endpoint configuration.

use std::time::Duration;

/// Endpoints and credentials for the external services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the video-generation API
    pub video_api_url: String,
    pub video_api_key: Option<String>,
    /// Base URL of the speech-synthesis API
    pub speech_api_url: String,
    pub speech_api_key: Option<String>,
    /// Speech model used for every synthesis request
    pub speech_model_id: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            video_api_url: "http://localhost:8080/v1".to_string(),
            video_api_key: None,
            speech_api_url: "https://api.elevenlabs.io/v1".to_string(),
            speech_api_key: None,
            speech_model_id: "eleven_multilingual_v2".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            video_api_url: env_or("VIDEO_API_URL", defaults.video_api_url),
            video_api_key: env_opt("VIDEO_API_KEY"),
            speech_api_url: env_or("SPEECH_API_URL", defaults.speech_api_url),
            speech_api_key: env_opt("SPEECH_API_KEY"),
            speech_model_id: env_or("SPEECH_MODEL_ID", defaults.speech_model_id),
            request_timeout: Duration::from_secs(
                std::env::var("SERVICE_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.request_timeout.as_secs()),
            ),
        }
    }

    pub fn with_video_api(mut self, url: impl Into<String>, key: Option<String>) -> Self {
        self.video_api_url = url.into();
        self.video_api_key = key;
        self
    }

    pub fn with_speech_api(mut self, url: impl Into<String>, key: Option<String>) -> Self {
        self.speech_api_url = url.into();
        self.speech_api_key = key;
        self
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
