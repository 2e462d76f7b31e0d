//! Video-generation service client.
//!
//! Generation is a long-running operation: `submit` returns a handle that is
//! polled until the service reports the video (inline bytes or a URI to fetch)
//! or a failure.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reel_models::GenerationDuration;

use crate::config::{join_url, ServiceConfig};
use crate::error::{ServiceError, ServiceResult};

/// One generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub duration: GenerationDuration,
    pub aspect_ratio: String,
    /// Image the video should open on
    pub first_frame: Option<PathBuf>,
    /// Image the video should end on
    pub last_frame: Option<PathBuf>,
}

/// Opaque name of a running generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(pub String);

impl OperationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A finished video as delivered by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedVideo {
    Inline(Vec<u8>),
    Remote(String),
}

/// State of a generation operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    Running,
    Done(GeneratedVideo),
    Failed(String),
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Start a generation.
    async fn submit(&self, request: &GenerationRequest) -> ServiceResult<OperationHandle>;

    /// Check on a generation.
    async fn poll(&self, handle: &OperationHandle) -> ServiceResult<OperationStatus>;

    /// Download a video delivered by URI.
    async fn fetch(&self, uri: &str) -> ServiceResult<Vec<u8>>;
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    prompt: &'a str,
    duration_seconds: u32,
    aspect_ratio: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_frame: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_frame: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    operation: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    done: bool,
    error: Option<OperationErrorBody>,
    result: Option<OperationResultBody>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OperationResultBody {
    video: VideoBody,
}

#[derive(Debug, Deserialize)]
struct VideoBody {
    bytes_base64: Option<String>,
    uri: Option<String>,
}

/// HTTP implementation of [`VideoGenerator`].
pub struct HttpVideoGenerator {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVideoGenerator {
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self {
            http,
            base_url: config.video_api_url.clone(),
            api_key: config.video_api_key.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

async fn encode_image(path: Option<&Path>) -> ServiceResult<Option<String>> {
    match path {
        Some(path) => {
            let bytes = tokio::fs::read(path).await?;
            Ok(Some(STANDARD.encode(bytes)))
        }
        None => Ok(None),
    }
}

/// Map non-success responses onto [`ServiceError`].
pub(crate) async fn check_status(response: Response) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ServiceError::RateLimited);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl VideoGenerator for HttpVideoGenerator {
    async fn submit(&self, request: &GenerationRequest) -> ServiceResult<OperationHandle> {
        let body = SubmitBody {
            prompt: &request.prompt,
            duration_seconds: request.duration.seconds(),
            aspect_ratio: &request.aspect_ratio,
            first_frame: encode_image(request.first_frame.as_deref()).await?,
            last_frame: encode_image(request.last_frame.as_deref()).await?,
        };

        let url = join_url(&self.base_url, "generations");
        debug!(url = %url, duration = %request.duration, "Submitting generation");

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await?;
        let submitted: SubmitResponse = check_status(response).await?.json().await?;

        info!(operation = %submitted.operation, "Generation accepted");
        Ok(OperationHandle(submitted.operation))
    }

    async fn poll(&self, handle: &OperationHandle) -> ServiceResult<OperationStatus> {
        let url = join_url(&self.base_url, &format!("operations/{}", handle.as_str()));
        let response = self.authorized(self.http.get(&url)).send().await?;
        let operation: OperationResponse = check_status(response).await?.json().await?;

        if let Some(error) = operation.error {
            return Ok(OperationStatus::Failed(error.message));
        }
        if !operation.done {
            return Ok(OperationStatus::Running);
        }

        let video = operation
            .result
            .map(|r| r.video)
            .ok_or_else(|| ServiceError::invalid_response("operation done without a result"))?;

        match (video.bytes_base64, video.uri) {
            (Some(encoded), _) => {
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| ServiceError::invalid_response(format!("bad video bytes: {e}")))?;
                Ok(OperationStatus::Done(GeneratedVideo::Inline(bytes)))
            }
            (None, Some(uri)) => Ok(OperationStatus::Done(GeneratedVideo::Remote(uri))),
            (None, None) => Err(ServiceError::invalid_response(
                "operation result carries neither bytes nor uri",
            )),
        }
    }

    async fn fetch(&self, uri: &str) -> ServiceResult<Vec<u8>> {
        let response = self.authorized(self.http.get(uri)).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> HttpVideoGenerator {
        let config = ServiceConfig::default()
            .with_video_api(server.uri(), Some("secret".to_string()));
        HttpVideoGenerator::new(&config).unwrap()
    }

    fn request(first_frame: Option<PathBuf>) -> GenerationRequest {
        GenerationRequest {
            prompt: "A lighthouse keeper climbs the stairs.".to_string(),
            duration: GenerationDuration::Six,
            aspect_ratio: "16:9".to_string(),
            first_frame,
            last_frame: None,
        }
    }

    #[tokio::test]
    async fn test_submit_sends_prompt_and_frame() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("ref.png");
        std::fs::write(&frame, b"png-bytes").unwrap();

        Mock::given(method("POST"))
            .and(path("/generations"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "prompt": "A lighthouse keeper climbs the stairs.",
                "duration_seconds": 6,
                "aspect_ratio": "16:9",
                "first_frame": STANDARD.encode(b"png-bytes"),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"operation": "op-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let handle = generator(&server).submit(&request(Some(frame))).await.unwrap();
        assert_eq!(handle, OperationHandle("op-1".to_string()));
    }

    #[tokio::test]
    async fn test_submit_missing_frame_is_io_error() {
        let server = MockServer::start().await;
        let err = generator(&server)
            .submit(&request(Some(PathBuf::from("/nonexistent/frame.png"))))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
    }

    async fn poll(gen: &HttpVideoGenerator, name: &str) -> OperationStatus {
        gen.poll(&OperationHandle(name.to_string())).await.unwrap()
    }

    #[tokio::test]
    async fn test_poll_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/running"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": false})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/inline"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "result": {"video": {"bytes_base64": STANDARD.encode(b"mp4")}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/remote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "result": {"video": {"uri": "https://cdn.example/v.mp4"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/failed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "error": {"message": "content policy"}
            })))
            .mount(&server)
            .await;

        let gen = generator(&server);
        assert_eq!(poll(&gen, "running").await, OperationStatus::Running);
        assert_eq!(
            poll(&gen, "inline").await,
            OperationStatus::Done(GeneratedVideo::Inline(b"mp4".to_vec()))
        );
        assert_eq!(
            poll(&gen, "remote").await,
            OperationStatus::Done(GeneratedVideo::Remote("https://cdn.example/v.mp4".into()))
        );
        assert_eq!(
            poll(&gen, "failed").await,
            OperationStatus::Failed("content policy".into())
        );
    }

    #[tokio::test]
    async fn test_done_without_video_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&server)
            .await;
        let err = generator(&server)
            .poll(&OperationHandle("empty".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/broken"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .respond_with(ResponseTemplate::new(400).set_body_string("prompt too long"))
            .mount(&server)
            .await;

        let gen = generator(&server);
        let busy = gen.poll(&OperationHandle("busy".into())).await.unwrap_err();
        assert!(matches!(busy, ServiceError::RateLimited));
        assert!(busy.is_retryable());

        let broken = gen.poll(&OperationHandle("broken".into())).await.unwrap_err();
        assert!(matches!(broken, ServiceError::Http { status: 502, .. }));
        assert!(broken.is_retryable());

        let rejected = gen.submit(&request(None)).await.unwrap_err();
        assert!(!rejected.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_remote_video() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-data".to_vec()))
            .mount(&server)
            .await;

        let bytes = generator(&server)
            .fetch(&format!("{}/files/v.mp4", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"video-data");
    }
}
