//! Single-writer job store.
//!
//! One actor task owns the job map. Every request is a message answered over
//! a oneshot channel, so load/modify/save never interleaves between callers.
//! After each mutation the whole store is written to a sibling temp file and
//! renamed over the store file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use reel_models::{GenerationJob, JobId};

use crate::error::{StoreError, StoreResult};
use crate::repository::{JobRepository, JobUpdate};

/// Pending requests before callers start waiting on the actor.
const COMMAND_BUFFER: usize = 64;

enum Command {
    Insert {
        job: GenerationJob,
        reply: oneshot::Sender<StoreResult<()>>,
    },
    Get {
        id: JobId,
        reply: oneshot::Sender<Option<GenerationJob>>,
    },
    Update {
        id: JobId,
        update: JobUpdate,
        reply: oneshot::Sender<StoreResult<GenerationJob>>,
    },
    List {
        reply: oneshot::Sender<Vec<GenerationJob>>,
    },
}

/// Handle to the job store actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobStore {
    tx: mpsc::Sender<Command>,
}

impl JobStore {
    /// Open (or create) a store persisted at `path`.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let jobs = load(&path).await?;
        info!(path = %path.display(), jobs = jobs.len(), "Opened job store");
        Ok(Self::spawn(jobs, Some(path)))
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::spawn(HashMap::new(), None)
    }

    fn spawn(jobs: HashMap<JobId, GenerationJob>, path: Option<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = StoreActor { jobs, path };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> StoreResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }
}

#[async_trait]
impl JobRepository for JobStore {
    async fn insert(&self, job: GenerationJob) -> StoreResult<()> {
        self.request(|reply| Command::Insert { job, reply }).await?
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<GenerationJob>> {
        let id = id.clone();
        self.request(|reply| Command::Get { id, reply }).await
    }

    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<GenerationJob> {
        let id = id.clone();
        self.request(|reply| Command::Update { id, update, reply })
            .await?
    }

    async fn list(&self) -> StoreResult<Vec<GenerationJob>> {
        self.request(|reply| Command::List { reply }).await
    }
}

struct StoreActor {
    jobs: HashMap<JobId, GenerationJob>,
    path: Option<PathBuf>,
}

impl StoreActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Insert { job, reply } => {
                    let _ = reply.send(self.insert(job).await);
                }
                Command::Get { id, reply } => {
                    let _ = reply.send(self.jobs.get(&id).cloned());
                }
                Command::Update { id, update, reply } => {
                    let _ = reply.send(self.update(&id, update).await);
                }
                Command::List { reply } => {
                    let _ = reply.send(self.sorted());
                }
            }
        }
        debug!("Job store actor stopped");
    }

    async fn insert(&mut self, job: GenerationJob) -> StoreResult<()> {
        if self.jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        let id = job.id.clone();
        self.jobs.insert(id.clone(), job);
        if let Err(e) = self.persist().await {
            self.jobs.remove(&id);
            return Err(e);
        }
        debug!(job_id = %id, "Inserted job");
        Ok(())
    }

    async fn update(&mut self, id: &JobId, update: JobUpdate) -> StoreResult<GenerationJob> {
        let current = self
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let mut next = current.clone();
        update.apply(&mut next)?;

        self.jobs.insert(id.clone(), next.clone());
        if let Err(e) = self.persist().await {
            self.jobs.insert(id.clone(), current);
            return Err(e);
        }
        debug!(job_id = %id, status = %next.status, "Updated job");
        Ok(next)
    }

    fn sorted(&self) -> Vec<GenerationJob> {
        let mut jobs: Vec<GenerationJob> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        jobs
    }

    async fn persist(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.sorted())?;
        let tmp = temp_path(path);
        let write = async {
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, path).await
        };
        if let Err(e) = write.await {
            error!(path = %path.display(), "Failed to persist job store: {}", e);
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn load(path: &Path) -> StoreResult<HashMap<JobId, GenerationJob>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }

    let jobs: Vec<GenerationJob> = serde_json::from_slice(&bytes)?;
    Ok(jobs.into_iter().map(|job| (job.id.clone(), job)).collect())
}
