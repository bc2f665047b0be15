//! Job dispatch to a spool-directory queue.
//!
//! The broker is a directory shared by the submitting host and the encode
//! workers. Each submitted batch becomes a group directory:
//!
//! ```text
//! <broker>/groups/<group_id>/group.json      manifest
//! <broker>/groups/<group_id>/<job_id>.json   job envelope (state + job)
//! <broker>/groups/<group_id>/<job_id>.claim  taken by the worker that runs the job
//! ```
//!
//! Records are written to a temp file and renamed into place, so readers never
//! see a partial record. Claims are taken with `create_new` and kept once the
//! job finishes; only `release_stale` gives a claim back. Two workers never run
//! the same job.

use crate::config::{Config, ConfigError, WorkerConfig};
use crate::jobs::Job;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

const MANIFEST_FILE: &str = "group.json";

/// Error type for queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    /// Submitting zero jobs is a caller error.
    #[error("Refusing to submit an empty job batch")]
    EmptyBatch,

    #[error("Queue I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Corrupt queue record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unknown job group '{0}'")]
    UnknownGroup(String),

    /// The job is no longer started by the worker reporting on it.
    #[error("Job {0} is no longer held by this worker")]
    ClaimLost(String),

    /// The worker already holds as many jobs as its prefetch limit allows.
    #[error("Worker '{worker}' already holds {held} job(s)")]
    PrefetchExhausted { worker: String, held: usize },
}

/// Lifecycle of a job inside the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Started => write!(f, "started"),
            TaskState::Success => write!(f, "success"),
            TaskState::Failure => write!(f, "failure"),
        }
    }
}

/// A job as stored in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: String,
    pub group_id: String,
    pub state: TaskState,
    /// Worker running (or that ran) the job.
    pub worker: Option<String>,
    /// Unix timestamp (milliseconds) when the job was submitted.
    pub submitted_at: i64,
    /// Unix timestamp (milliseconds) of the last state change.
    pub updated_at: i64,
    /// Failure reason reported by the worker.
    pub error: Option<String>,
    pub job: Job,
}

/// Group manifest written at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupManifest {
    pub id: String,
    pub created_at: i64,
    pub queued_by: String,
    pub job_ids: Vec<String>,
    /// Seconds finished results are kept before the group may be purged.
    pub result_expires_secs: u64,
    /// Options workers must honour for these jobs.
    pub worker: WorkerConfig,
}

/// Snapshot of a group's job states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupProgress {
    pub total: usize,
    pub pending: usize,
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl GroupProgress {
    /// Every job reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.succeeded + self.failed >= self.total
    }

    fn record(&mut self, state: TaskState) {
        self.total += 1;
        match state {
            TaskState::Pending => self.pending += 1,
            TaskState::Started => self.started += 1,
            TaskState::Success => self.succeeded += 1,
            TaskState::Failure => self.failed += 1,
        }
    }
}

/// Handle to a submitted batch.
pub trait JobGroup {
    fn id(&self) -> &str;

    /// Current state counts of the group's jobs.
    fn progress(&self) -> Result<GroupProgress, QueueError>;
}

/// Destination for job batches.
pub trait JobQueue {
    type Group: JobGroup;

    /// Submits all jobs as a single group. Empty batches are rejected.
    fn submit(&self, jobs: Vec<Job>) -> Result<Self::Group, QueueError>;
}

/// Queue backed by a spool directory.
#[derive(Debug, Clone)]
pub struct SpoolQueue {
    root: PathBuf,
    result_expires: Duration,
    worker: WorkerConfig,
}

/// A group stored in a [`SpoolQueue`].
#[derive(Debug, Clone)]
pub struct SpoolGroup {
    id: String,
    dir: PathBuf,
    job_ids: Vec<String>,
}

impl SpoolQueue {
    pub fn new(root: impl Into<PathBuf>, result_expires: Duration, worker: WorkerConfig) -> Self {
        Self {
            root: root.into(),
            result_expires,
            worker,
        }
    }

    /// Queue at the configured broker location.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.broker.spool_dir()?,
            Duration::from_secs(config.broker.result_expires_secs),
            config.worker.clone(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn groups_dir(&self) -> PathBuf {
        self.root.join("groups")
    }

    /// Opens a previously submitted group.
    pub fn group(&self, id: &str) -> Result<SpoolGroup, QueueError> {
        let dir = self.groups_dir().join(id);
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(QueueError::UnknownGroup(id.to_string()));
        }
        let manifest: GroupManifest = read_json(&manifest_path)?;
        Ok(SpoolGroup {
            id: manifest.id,
            dir,
            job_ids: manifest.job_ids,
        })
    }

    /// Groups in submission order.
    fn manifests(&self) -> Result<Vec<(PathBuf, GroupManifest)>, QueueError> {
        let groups_dir = self.groups_dir();
        if !groups_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&groups_dir).map_err(|source| QueueError::Io {
            path: groups_dir.clone(),
            source,
        })?;

        let mut manifests = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let dir = entry.path();
            let manifest_path = dir.join(MANIFEST_FILE);
            if !manifest_path.exists() {
                continue;
            }
            match read_json::<GroupManifest>(&manifest_path) {
                Ok(manifest) => manifests.push((dir, manifest)),
                Err(e) => warn!("Skipping unreadable group: {}", e),
            }
        }
        manifests.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then(a.1.id.cmp(&b.1.id)));
        Ok(manifests)
    }

    /// Claims the oldest pending job for `worker` and marks it started.
    ///
    /// A worker holds at most `concurrency * prefetch_multiplier` started jobs.
    /// With late acknowledgement the claim is the acknowledgement, so it is only
    /// taken when the worker is about to run the job.
    pub fn claim_next(&self, worker: &str) -> Result<Option<JobEnvelope>, QueueError> {
        let manifests = self.manifests()?;

        let limit = (self.worker.concurrency.max(1) * self.worker.prefetch_multiplier.max(1))
            as usize;
        let held = count_started(&manifests, worker)?;
        if held >= limit {
            return Err(QueueError::PrefetchExhausted {
                worker: worker.to_string(),
                held,
            });
        }

        for (dir, manifest) in &manifests {
            for job_id in &manifest.job_ids {
                let job_path = dir.join(format!("{}.json", job_id));
                let envelope: JobEnvelope = read_json(&job_path)?;
                if envelope.state != TaskState::Pending {
                    continue;
                }

                let claim_path = dir.join(format!("{}.claim", job_id));
                if !take_claim(&claim_path, worker)? {
                    continue;
                }

                // The job may have moved on between the read and the claim
                let mut envelope: JobEnvelope = read_json(&job_path)?;
                if envelope.state != TaskState::Pending {
                    remove_if_exists(&claim_path)?;
                    continue;
                }

                envelope.state = TaskState::Started;
                envelope.worker = Some(worker.to_string());
                envelope.updated_at = current_timestamp_ms();
                write_json(&job_path, &envelope)?;

                debug!("Worker {} claimed job {}", worker, envelope.id);
                return Ok(Some(envelope));
            }
        }

        Ok(None)
    }

    /// Marks a started job as still running so `release_stale` leaves it alone.
    pub fn heartbeat(&self, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let job_path = self.job_path(envelope);
        let mut stored = self.owned_by(envelope, &job_path)?;
        stored.updated_at = current_timestamp_ms();
        write_json(&job_path, &stored)
    }

    /// Records the outcome of a started job.
    ///
    /// The claim file stays in place, so a finished job is never claimed again.
    pub fn complete(
        &self,
        envelope: &JobEnvelope,
        outcome: Result<(), String>,
    ) -> Result<(), QueueError> {
        let job_path = self.job_path(envelope);
        let mut stored = self.owned_by(envelope, &job_path)?;

        match outcome {
            Ok(()) => {
                stored.state = TaskState::Success;
                stored.error = None;
            }
            Err(reason) => {
                stored.state = TaskState::Failure;
                stored.error = Some(reason);
            }
        }
        stored.updated_at = current_timestamp_ms();
        write_json(&job_path, &stored)
    }

    fn job_path(&self, envelope: &JobEnvelope) -> PathBuf {
        self.groups_dir()
            .join(&envelope.group_id)
            .join(format!("{}.json", envelope.id))
    }

    /// Stored envelope, provided the job is still started by the envelope's worker.
    fn owned_by(&self, envelope: &JobEnvelope, job_path: &Path) -> Result<JobEnvelope, QueueError> {
        let stored: JobEnvelope = read_json(job_path)?;
        if stored.state != TaskState::Started || stored.worker != envelope.worker {
            return Err(QueueError::ClaimLost(envelope.id.clone()));
        }
        Ok(stored)
    }

    /// Handles jobs whose worker stopped reporting.
    ///
    /// Started jobs without a heartbeat for longer than `older_than` lose their
    /// claim. With late acknowledgement they go back to pending; otherwise the
    /// job was already acknowledged and is marked failed.
    pub fn release_stale(&self, older_than: Duration) -> Result<usize, QueueError> {
        let cutoff = current_timestamp_ms() - older_than.as_millis() as i64;
        let mut released = 0;

        for (dir, manifest) in self.manifests()? {
            for job_id in &manifest.job_ids {
                let job_path = dir.join(format!("{}.json", job_id));
                let mut envelope: JobEnvelope = read_json(&job_path)?;
                if envelope.state != TaskState::Started || envelope.updated_at > cutoff {
                    continue;
                }

                envelope.updated_at = current_timestamp_ms();
                if manifest.worker.acks_late {
                    envelope.state = TaskState::Pending;
                    envelope.worker = None;
                    // State first: a reader that sees the claim gone also sees Pending
                    write_json(&job_path, &envelope)?;
                    remove_if_exists(&dir.join(format!("{}.claim", job_id)))?;
                } else {
                    envelope.state = TaskState::Failure;
                    envelope.error = Some("worker lost".to_string());
                    write_json(&job_path, &envelope)?;
                }
                released += 1;
            }
        }

        if released > 0 {
            info!("Released {} stale job(s)", released);
        }
        Ok(released)
    }

    /// Removes finished groups whose results are older than their retention.
    pub fn purge_expired(&self) -> Result<usize, QueueError> {
        let now = current_timestamp_ms();
        let mut purged = 0;

        for (dir, manifest) in self.manifests()? {
            let mut finished_at = manifest.created_at;
            let mut all_terminal = true;
            for job_id in &manifest.job_ids {
                let envelope: JobEnvelope = read_json(&dir.join(format!("{}.json", job_id)))?;
                if !envelope.state.is_terminal() {
                    all_terminal = false;
                    break;
                }
                finished_at = finished_at.max(envelope.updated_at);
            }

            let expires_at = finished_at + (manifest.result_expires_secs as i64) * 1000;
            if all_terminal && expires_at <= now {
                fs::remove_dir_all(&dir).map_err(|source| QueueError::Io {
                    path: dir.clone(),
                    source,
                })?;
                debug!("Purged expired group {}", manifest.id);
                purged += 1;
            }
        }

        Ok(purged)
    }
}

impl JobQueue for SpoolQueue {
    type Group = SpoolGroup;

    fn submit(&self, jobs: Vec<Job>) -> Result<SpoolGroup, QueueError> {
        if jobs.is_empty() {
            return Err(QueueError::EmptyBatch);
        }

        let group_id = Uuid::new_v4().to_string();
        let dir = self.groups_dir().join(&group_id);
        fs::create_dir_all(&dir).map_err(|source| QueueError::Io {
            path: dir.clone(),
            source,
        })?;

        let now = current_timestamp_ms();
        let queued_by = jobs[0].queued_by.clone();
        let mut job_ids = Vec::with_capacity(jobs.len());

        for job in jobs {
            let id = Uuid::new_v4().to_string();
            let envelope = JobEnvelope {
                id: id.clone(),
                group_id: group_id.clone(),
                state: TaskState::Pending,
                worker: None,
                submitted_at: now,
                updated_at: now,
                error: None,
                job,
            };
            write_json(&dir.join(format!("{}.json", id)), &envelope)?;
            job_ids.push(id);
        }

        // The manifest goes last: workers only see complete groups
        let manifest = GroupManifest {
            id: group_id.clone(),
            created_at: now,
            queued_by,
            job_ids: job_ids.clone(),
            result_expires_secs: self.result_expires.as_secs(),
            worker: self.worker.clone(),
        };
        write_json(&dir.join(MANIFEST_FILE), &manifest)?;

        info!("Submitted group {} with {} job(s)", group_id, job_ids.len());
        Ok(SpoolGroup {
            id: group_id,
            dir,
            job_ids,
        })
    }
}

impl SpoolGroup {
    pub fn job_ids(&self) -> &[String] {
        &self.job_ids
    }

    /// Loads every envelope in the group.
    pub fn envelopes(&self) -> Result<Vec<JobEnvelope>, QueueError> {
        self.job_ids
            .iter()
            .map(|id| read_json(&self.dir.join(format!("{}.json", id))))
            .collect()
    }
}

impl JobGroup for SpoolGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn progress(&self) -> Result<GroupProgress, QueueError> {
        let mut progress = GroupProgress::default();
        for envelope in self.envelopes()? {
            progress.record(envelope.state);
        }
        Ok(progress)
    }
}

/// Jobs currently started by `worker`.
fn count_started(
    manifests: &[(PathBuf, GroupManifest)],
    worker: &str,
) -> Result<usize, QueueError> {
    let mut held = 0;
    for (dir, manifest) in manifests {
        for job_id in &manifest.job_ids {
            let envelope: JobEnvelope = read_json(&dir.join(format!("{}.json", job_id)))?;
            if envelope.state == TaskState::Started && envelope.worker.as_deref() == Some(worker) {
                held += 1;
            }
        }
    }
    Ok(held)
}

/// Creates the claim file. `false` when another worker holds it.
fn take_claim(claim_path: &Path, worker: &str) -> Result<bool, QueueError> {
    let io_err = |source| QueueError::Io {
        path: claim_path.to_path_buf(),
        source,
    };
    match OpenOptions::new().write(true).create_new(true).open(claim_path) {
        Ok(mut file) => {
            file.write_all(worker.as_bytes()).map_err(io_err)?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(source) => Err(io_err(source)),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, QueueError> {
    let content = fs::read_to_string(path).map_err(|source| QueueError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| QueueError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), QueueError> {
    let io_err = |source| QueueError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", Uuid::new_v4()));
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

fn remove_if_exists(path: &Path) -> Result<(), QueueError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(QueueError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
