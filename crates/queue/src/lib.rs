//! Proxy Queue
//!
//! Reconciles a timeline's clips against the proxy media on disk, then queues
//! proxy encodes for whatever is still missing and waits for the batch.

pub mod catalog;
pub mod classify;
pub mod jobs;
pub mod link;
pub mod media;
pub mod monitor;
pub mod paths;
pub mod prompt;
pub mod queue;
pub mod reconcile;
pub mod relocate;
pub mod scan;
pub mod session;
pub mod timeline;

pub use catalog::{collect_clips, dedup_clips, CollectedClips, MediaCatalog};
pub use classify::{partition, resolve_offline, skip_linked, Partition};
pub use jobs::{build_jobs, local_host_name, BatchContext, Job, JobStatus, JOB_KIND};
pub use link::{annotate_existing, resolve_unlinked};
pub use media::{ClipAttributes, MediaError, MediaRecord, ProxyStatus};
pub use monitor::{BatchSummary, JobMonitor, MonitorError};
pub use paths::{
    detect_orphans, expected_proxy_dir, expected_proxy_file, reconcile_orphans, OrphanMove,
};
pub use prompt::{Answer, Notifier, Prompt, PromptError};
pub use proxy_queue_config as config;
pub use proxy_queue_config::Config;
pub use queue::{
    GroupManifest, GroupProgress, JobEnvelope, JobGroup, JobQueue, QueueError, SpoolGroup,
    SpoolQueue, TaskState,
};
pub use reconcile::{dispatch, Reconciler, Reconciliation, ReconcileError, RunSummary, Step};
pub use relocate::{move_proxy, MoveOutcome, RelocateError};
pub use scan::{find_candidates, parse_revision, select_candidate, ProxyCandidate};
pub use session::{Outcome, Session, SessionError};
pub use timeline::{
    ExportedTimeline, ProxyLink, TimelineError, TimelineExport, TimelineSource, VideoTrack,
};
