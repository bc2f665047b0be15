//! Reconciliation pipeline: decides which clips still need a proxy render.
//!
//! Steps run in a fixed order over the catalog:
//! 1. partition by proxy status
//! 2. drop already-linked clips
//! 3. move orphaned proxies to their expected location
//! 4. ask about offline proxies
//! 5. link proxies that exist on disk but are not linked
//!
//! Whatever survives is the render set.

use crate::classify::{partition, resolve_offline, skip_linked};
use crate::config::Config;
use crate::jobs::{build_jobs, BatchContext};
use crate::link::resolve_unlinked;
use crate::media::MediaRecord;
use crate::paths::reconcile_orphans;
use crate::prompt::{Prompt, PromptError};
use crate::queue::{JobQueue, QueueError};
use crate::timeline::{TimelineError, TimelineSource};
use log::info;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Reconciliation step that can be cancelled by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    OfflineProxies,
    OrphanedProxies,
    UnlinkedProxies,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::OfflineProxies => write!(f, "offline proxies"),
            Step::OrphanedProxies => write!(f, "orphaned proxies"),
            Step::UnlinkedProxies => write!(f, "unlinked proxies"),
        }
    }
}

/// Error type for reconciliation
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The operator chose Cancel. No jobs may be queued.
    #[error("Cancelled by user at {0}")]
    Cancelled(Step),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// What reconciliation did, step by step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub skipped_linked: usize,
    pub offline_found: usize,
    pub offline_rerendered: usize,
    pub orphans_found: usize,
    pub orphans_moved: usize,
    pub orphans_failed: usize,
    pub unlinked_found: usize,
    pub unlinked_linked: usize,
    pub link_failures: usize,
    pub prompts_shown: usize,
}

impl RunSummary {
    /// The operator was asked something or files were changed.
    pub fn action_taken(&self) -> bool {
        self.prompts_shown > 0 || self.orphans_moved > 0 || self.unlinked_linked > 0
    }
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Records that need a proxy rendered, in catalog order.
    pub render: Vec<MediaRecord>,
    pub summary: RunSummary,
}

/// Runs the reconciliation steps against one timeline.
pub struct Reconciler<'a> {
    proxy_root: PathBuf,
    revision_sep: String,
    prompt: &'a dyn Prompt,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        proxy_root: impl Into<PathBuf>,
        revision_sep: impl Into<String>,
        prompt: &'a dyn Prompt,
    ) -> Self {
        Self {
            proxy_root: proxy_root.into(),
            revision_sep: revision_sep.into(),
            prompt,
        }
    }

    pub fn from_config(config: &Config, prompt: &'a dyn Prompt) -> Self {
        Self::new(
            config.paths.proxy_path_root.clone(),
            config.paths.revision_sep.clone(),
            prompt,
        )
    }

    /// Reconcile catalog records and return the render set.
    ///
    /// Cancel at any prompt aborts with [`ReconcileError::Cancelled`].
    pub fn run(
        &self,
        records: Vec<MediaRecord>,
        timeline: &mut dyn TimelineSource,
    ) -> Result<Reconciliation, ReconcileError> {
        let mut summary = RunSummary::default();
        let parts = partition(records);

        skip_linked(&parts.linked, &mut summary);

        reconcile_orphans(
            parts.linked.iter().chain(parts.offline.iter()),
            &self.proxy_root,
            self.prompt,
            &mut summary,
        )?;

        let rerender = resolve_offline(parts.offline, self.prompt, &mut summary)?;

        let mut remaining = parts.remaining;
        remaining.extend(rerender);

        let render = resolve_unlinked(
            remaining,
            &self.proxy_root,
            &self.revision_sep,
            self.prompt,
            timeline,
            &mut summary,
        )?;

        info!("{} clip(s) left to render", render.len());
        Ok(Reconciliation { render, summary })
    }
}

/// Build jobs for the render set and submit them as one group.
///
/// Returns `None` without touching the queue when there is nothing to render.
pub fn dispatch<Q: JobQueue>(
    queue: &Q,
    render: Vec<MediaRecord>,
    context: &BatchContext,
) -> Result<Option<Q::Group>, QueueError> {
    if render.is_empty() {
        return Ok(None);
    }
    let jobs = build_jobs(render, context);
    info!("Sending {} job(s).", jobs.len());
    queue.submit(jobs).map(Some)
}
