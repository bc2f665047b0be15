//! Classifier module for partitioning media by proxy state.
//!
//! Every record lands in exactly one partition:
//! - already linked: never re-rendered automatically
//! - offline: the operator decides whether to re-render
//! - remaining: no proxy linked, handed on to link resolution and rendering

use crate::media::{MediaRecord, ProxyStatus};
use crate::prompt::{Answer, Prompt};
use crate::reconcile::{ReconcileError, RunSummary, Step};
use log::{info, warn};

/// Media split by proxy status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub linked: Vec<MediaRecord>,
    pub offline: Vec<MediaRecord>,
    pub remaining: Vec<MediaRecord>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.linked.len() + self.offline.len() + self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition records by the proxy status reported at catalog time.
pub fn partition(records: Vec<MediaRecord>) -> Partition {
    let mut partition = Partition::default();
    for record in records {
        match record.proxy_status {
            ProxyStatus::Linked => partition.linked.push(record),
            ProxyStatus::Offline => partition.offline.push(record),
            ProxyStatus::None => partition.remaining.push(record),
        }
    }
    partition
}

/// Report already-linked media. They are dropped from the working set.
///
/// To re-render a linked clip the operator unlinks its proxy first.
pub fn skip_linked(linked: &[MediaRecord], summary: &mut RunSummary) {
    info!("Checking for source media with linked proxies.");
    if linked.is_empty() {
        info!("Found none.");
        return;
    }
    info!("Skipping {} already linked.", linked.len());
    summary.skipped_linked = linked.len();
}

/// Ask whether offline proxies should be re-rendered.
///
/// Returns the records to re-render, flipped to `ProxyStatus::None`. On `No`
/// the returned list is empty; on `Cancel` the run is aborted.
pub fn resolve_offline(
    offline: Vec<MediaRecord>,
    prompt: &dyn Prompt,
    summary: &mut RunSummary,
) -> Result<Vec<MediaRecord>, ReconcileError> {
    info!("Checking for offline proxies.");
    if offline.is_empty() {
        info!("Found none.");
        return Ok(Vec::new());
    }

    info!("Offline proxies: {}", offline.len());
    summary.offline_found = offline.len();
    summary.prompts_shown += 1;

    let answer = prompt.confirm_tri_state(
        "Offline proxies",
        &format!(
            "{} clip(s) have offline proxies.\nWould you like to rerender them?",
            offline.len()
        ),
    )?;

    match answer {
        Answer::Yes => {
            info!("Rerendering offline: {}", offline.len());
            summary.offline_rerendered = offline.len();
            Ok(offline
                .into_iter()
                .map(|mut record| {
                    record.proxy_status = ProxyStatus::None;
                    record.linked_proxy_path = None;
                    record
                })
                .collect())
        }
        Answer::No => {
            warn!("Leaving {} offline clip(s) out of the queue.", offline.len());
            Ok(Vec::new())
        }
        Answer::Cancel => Err(ReconcileError::Cancelled(Step::OfflineProxies)),
    }
}
