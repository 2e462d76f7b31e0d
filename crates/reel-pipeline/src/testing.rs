//! Scripted in-memory video generator for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use reel_services::{
    GeneratedVideo, GenerationRequest, OperationHandle, OperationStatus, ServiceError,
    ServiceResult, VideoGenerator,
};

/// How one submitted operation ends.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    /// Done with inline bytes after one `Running` poll
    Inline(Vec<u8>),
    /// Done with a URI to fetch after one `Running` poll
    Remote(String),
    /// Service-side failure after one `Running` poll
    Fail(String),
    /// Submission rejected with this HTTP status
    Reject(u16),
    /// Never finishes
    Hang,
}

#[derive(Default)]
struct State {
    script: VecDeque<Outcome>,
    operations: HashMap<String, (Outcome, u32)>,
    submissions: Vec<GenerationRequest>,
    fetched: Vec<String>,
}

/// Plays back one scripted outcome per submission, in order. Submissions
/// past the end of the script succeed with inline bytes.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    state: Mutex<State>,
}

impl ScriptedGenerator {
    pub(crate) fn new(script: Vec<Outcome>) -> Self {
        Self {
            state: Mutex::new(State {
                script: script.into(),
                ..State::default()
            }),
        }
    }

    pub(crate) fn submissions(&self) -> Vec<GenerationRequest> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.state.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl VideoGenerator for ScriptedGenerator {
    async fn submit(&self, request: &GenerationRequest) -> ServiceResult<OperationHandle> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(request.clone());
        let outcome = state
            .script
            .pop_front()
            .unwrap_or_else(|| Outcome::Inline(b"take-bytes".to_vec()));
        if let Outcome::Reject(status) = outcome {
            return Err(ServiceError::Http {
                status,
                body: "rejected".to_string(),
            });
        }
        let name = format!("operations/{}", state.submissions.len());
        state.operations.insert(name.clone(), (outcome, 0));
        Ok(OperationHandle(name))
    }

    async fn poll(&self, handle: &OperationHandle) -> ServiceResult<OperationStatus> {
        let mut state = self.state.lock().unwrap();
        let (outcome, polls) = state
            .operations
            .get_mut(handle.as_str())
            .ok_or_else(|| ServiceError::Http {
                status: 404,
                body: "unknown operation".to_string(),
            })?;
        *polls += 1;
        if *polls == 1 {
            return Ok(OperationStatus::Running);
        }
        Ok(match outcome {
            Outcome::Inline(bytes) => OperationStatus::Done(GeneratedVideo::Inline(bytes.clone())),
            Outcome::Remote(uri) => OperationStatus::Done(GeneratedVideo::Remote(uri.clone())),
            Outcome::Fail(message) => OperationStatus::Failed(message.clone()),
            Outcome::Reject(_) | Outcome::Hang => OperationStatus::Running,
        })
    }

    async fn fetch(&self, uri: &str) -> ServiceResult<Vec<u8>> {
        self.state.lock().unwrap().fetched.push(uri.to_string());
        Ok(format!("fetched:{uri}").into_bytes())
    }
}
