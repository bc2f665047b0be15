//! One queueing session: read the timeline, reconcile, confirm and submit.
//!
//! [`Session::run`] is synchronous and may block on the operator. Async callers
//! run it on a blocking thread.

use crate::catalog::{collect_clips, MediaCatalog};
use crate::config::Config;
use crate::jobs::BatchContext;
use crate::prompt::{Prompt, PromptError};
use crate::queue::{JobQueue, QueueError};
use crate::reconcile::{dispatch, ReconcileError, Reconciler, RunSummary, Step};
use crate::timeline::{TimelineError, TimelineSource};
use log::{debug, info, warn};
use thiserror::Error;

/// Error type for a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// How a session ended.
#[derive(Debug)]
pub enum Outcome<G> {
    /// The operator chose Cancel at a reconciliation step.
    Cancelled(Step),
    /// Nothing was left to render after reconciliation.
    NothingToQueue(RunSummary),
    /// The operator declined to queue the ready clips.
    Declined { ready: usize },
    Submitted { group: G, jobs: usize },
}

impl<G> Outcome<G> {
    /// Process exit status for this outcome.
    pub fn exit_status(&self) -> u8 {
        match self {
            Outcome::Cancelled(_) | Outcome::NothingToQueue(_) => 1,
            Outcome::Declined { .. } | Outcome::Submitted { .. } => 0,
        }
    }
}

pub struct Session<'a> {
    config: &'a Config,
    prompt: &'a dyn Prompt,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a Config, prompt: &'a dyn Prompt) -> Self {
        Self { config, prompt }
    }

    /// Reconcile `timeline` and, once the operator agrees, submit one job per
    /// clip still missing a proxy.
    pub fn run<Q: JobQueue>(
        &self,
        timeline: &mut dyn TimelineSource,
        queue: &Q,
        queued_by: &str,
    ) -> Result<Outcome<Q::Group>, SessionError> {
        let tracks = match timeline.video_tracks() {
            Ok(tracks) => tracks,
            Err(e) => {
                self.prompt.alert("No usable tracks", &e.to_string());
                return Err(e.into());
            }
        };

        let collected = collect_clips(&tracks, &self.config.filters.acceptable_exts);
        if !collected.missing_media.is_empty() {
            warn!(
                "{} clip(s) have no source media and were skipped: {}",
                collected.missing_media.len(),
                collected.missing_media.join(", ")
            );
        }

        let catalog = MediaCatalog::build(collected.clips);
        info!(
            "Total clips on timeline: {}, unique source media: {}",
            catalog.total_clips,
            catalog.len()
        );
        if !catalog.rejected.is_empty() {
            warn!("{} clip(s) skipped for missing attributes", catalog.rejected.len());
        }

        let reconciler = Reconciler::from_config(self.config, self.prompt);
        let reconciliation = match reconciler.run(catalog.into_records(), timeline) {
            Ok(reconciliation) => reconciliation,
            Err(ReconcileError::Cancelled(step)) => return Ok(Outcome::Cancelled(step)),
            Err(e) => return Err(e.into()),
        };
        debug!("Reconciliation summary: {:?}", reconciliation.summary);

        let render = reconciliation.render;
        if render.is_empty() {
            let detail = if reconciliation.summary.action_taken() {
                "Every clip was linked or handled above."
            } else {
                "There is no new media to queue for proxies."
            };
            self.prompt.alert(
                "No clips to queue",
                &format!(
                    "{}\nIf you want to re-render some proxies, unlink those existing proxies \
                     on the timeline and try again.",
                    detail
                ),
            );
            return Ok(Outcome::NothingToQueue(reconciliation.summary));
        }

        let ready = render.len();
        if !self
            .prompt
            .confirm("Go time!", &format!("{} clip(s) are ready to queue!", ready))?
        {
            return Ok(Outcome::Declined { ready });
        }

        let context =
            BatchContext::new(timeline.project_name(), timeline.timeline_name(), queued_by);
        match dispatch(queue, render, &context)? {
            Some(group) => Ok(Outcome::Submitted { group, jobs: ready }),
            None => Ok(Outcome::NothingToQueue(reconciliation.summary)),
        }
    }
}
