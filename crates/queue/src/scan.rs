//! Scanner for proxy files already rendered into the expected proxy directory.
//!
//! A proxy belongs to a source when its stem equals the source stem, optionally
//! followed by a revision suffix: `clip001.mov`, `clip001_v3.mp4`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// An on-disk file that looks like a rendered proxy for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCandidate {
    /// Full path to the candidate file.
    pub path: PathBuf,
    /// Last modified time, when the filesystem reports one.
    pub modified: Option<SystemTime>,
    /// Revision number parsed from the file name (0 when unrevisioned).
    pub revision: u32,
}

/// Parses the revision of `file_stem` relative to `source_stem`.
///
/// Returns `Some(0)` for an exact match, `Some(n)` for `<source_stem><sep><n>`,
/// and `None` when the file does not belong to the source.
pub fn parse_revision(file_stem: &str, source_stem: &str, revision_sep: &str) -> Option<u32> {
    let rest = file_stem.strip_prefix(source_stem)?;
    if rest.is_empty() {
        return Some(0);
    }
    if revision_sep.is_empty() {
        return None;
    }
    let digits = rest.strip_prefix(revision_sep)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Lists files in `dir` (not recursive) that belong to `source_stem`.
///
/// A missing directory yields no candidates.
pub fn find_candidates(dir: &Path, source_stem: &str, revision_sep: &str) -> Vec<ProxyCandidate> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    let walker = WalkDir::new(dir).min_depth(1).max_depth(1);

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        // Proxies always carry an extension
        if path.extension().is_none() {
            continue;
        }
        let Some(file_stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(revision) = parse_revision(file_stem, source_stem, revision_sep) else {
            continue;
        };

        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        candidates.push(ProxyCandidate {
            path: path.to_path_buf(),
            modified,
            revision,
        });
    }

    candidates
}

/// Picks the proxy to link out of several candidates.
///
/// Newest modification time wins. When any candidate has no modification time
/// the times cannot be compared, and the highest revision wins instead.
pub fn select_candidate(candidates: &[ProxyCandidate]) -> Option<&ProxyCandidate> {
    let all_timed = candidates.iter().all(|c| c.modified.is_some());

    if all_timed {
        candidates
            .iter()
            .max_by(|a, b| a.modified.cmp(&b.modified).then(a.revision.cmp(&b.revision)))
    } else {
        candidates
            .iter()
            .max_by(|a, b| a.revision.cmp(&b.revision).then(b.path.cmp(&a.path)))
    }
}
