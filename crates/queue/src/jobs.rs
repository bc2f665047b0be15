//! Job builder: render jobs for media that needs a proxy.
//!
//! A job is a media record plus the batch context an Encode Worker needs.
//! Jobs are immutable once built; the queue owns every later status change.

use crate::media::MediaRecord;
use serde::{Deserialize, Serialize};

/// Job type understood by the encode workers.
pub const JOB_KIND: &str = "Resolve";

/// Status a job is submitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker.
    Ready,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Ready
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Ready => write!(f, "ready"),
        }
    }
}

/// One clip to be proxy-encoded.
///
/// Serializes to a flat JSON object: the clip's attributes side by side with
/// `project`, `timeline`, `status`, `queued_by` and `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(flatten)]
    pub media: MediaRecord,
    pub project: String,
    pub timeline: String,
    pub status: JobStatus,
    /// Host the job was submitted from.
    pub queued_by: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Context shared by every job in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchContext {
    pub project: String,
    pub timeline: String,
    pub queued_by: String,
}

impl BatchContext {
    pub fn new(
        project: impl Into<String>,
        timeline: impl Into<String>,
        queued_by: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            timeline: timeline.into(),
            queued_by: queued_by.into(),
        }
    }
}

/// Name of the submitting host, or `unknown-host` when it cannot be read.
pub fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Creates one job per record, in order.
pub fn build_jobs(records: Vec<MediaRecord>, context: &BatchContext) -> Vec<Job> {
    records
        .into_iter()
        .map(|media| Job {
            media,
            project: context.project.clone(),
            timeline: context.timeline.clone(),
            status: JobStatus::Ready,
            queued_by: context.queued_by.clone(),
            kind: JOB_KIND.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::record;
    use std::path::PathBuf;

    fn context() -> BatchContext {
        BatchContext::new("Documentary", "Assembly v3", "edit-bay-2")
    }

    #[test]
    fn test_job_status_default_and_display() {
        assert_eq!(JobStatus::default(), JobStatus::Ready);
        assert_eq!(format!("{}", JobStatus::Ready), "ready");
    }

    #[test]
    fn test_build_jobs_preserves_order_and_context() {
        let records = vec![
            record("/volumes/proj/a.mov", "None", ""),
            record("/volumes/proj/b.mov", "None", ""),
            record("/volumes/proj/c.mov", "None", ""),
        ];

        let jobs = build_jobs(records, &context());

        assert_eq!(jobs.len(), 3);
        let names: Vec<_> = jobs.iter().map(|j| j.media.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.mov", "b.mov", "c.mov"]);
        for job in &jobs {
            assert_eq!(job.status, JobStatus::Ready);
            assert_eq!(job.project, "Documentary");
            assert_eq!(job.timeline, "Assembly v3");
            assert_eq!(job.queued_by, "edit-bay-2");
        }
    }

    #[test]
    fn test_build_jobs_empty() {
        assert!(build_jobs(Vec::new(), &context()).is_empty());
    }

    #[test]
    fn test_job_serializes_flat() {
        let mut media = record("/volumes/proj/shoot1/a.mov", "None", "");
        media.expected_proxy_path = Some(PathBuf::from("/proxies/proj/shoot1"));
        media.attributes.insert("Resolution".to_string(), "3840x2160".to_string());
        let job = build_jobs(vec![media], &context()).remove(0);

        let json = serde_json::to_value(&job).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object["File Path"], "/volumes/proj/shoot1/a.mov");
        assert_eq!(object["Expected Proxy Path"], "/proxies/proj/shoot1");
        assert_eq!(object["Resolution"], "3840x2160");
        assert_eq!(object["project"], "Documentary");
        assert_eq!(object["timeline"], "Assembly v3");
        assert_eq!(object["status"], "ready");
        assert_eq!(object["queued_by"], "edit-bay-2");
        assert_eq!(object["type"], "Resolve");
        assert!(object.values().all(|v| !v.is_object()));
    }

    #[test]
    fn test_job_reads_back_from_queue_message() {
        let job = build_jobs(vec![record("/volumes/proj/a.mov", "None", "")], &context()).remove(0);
        let json = serde_json::to_string(&job).unwrap();

        let decoded: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, job);
        assert!(decoded.media.attributes.is_empty());
    }

    #[test]
    fn test_local_host_name_not_empty() {
        assert!(!local_host_name().is_empty());
    }
}
