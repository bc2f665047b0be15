//! Proxy path convention and orphan reconciliation.
//!
//! A clip's proxy lives under the proxy root, in a directory mirroring the
//! source's directory minus its top-level component:
//! `/volumes/proj/shoot1/clip001.mov` -> `<root>/proj/shoot1/clip001.<ext>`.
//!
//! A linked proxy that no longer sits where the convention puts it is orphaned,
//! usually because the source media was reorganised after rendering.

use crate::media::{MediaRecord, ProxyStatus};
use crate::prompt::{Answer, Prompt};
use crate::reconcile::{ReconcileError, RunSummary, Step};
use crate::relocate::{move_proxy, MoveOutcome};
use log::{error, info, warn};
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components and resolve `..` against
/// preceding components. The filesystem is never consulted.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Directory a source's proxy belongs in.
///
/// The drive prefix (if any) or else the first named component of the
/// source's directory is the top-level component, and is not mirrored.
pub fn expected_proxy_dir(proxy_root: &Path, source: &Path) -> PathBuf {
    let source_dir = normalize(source.parent().unwrap_or_else(|| Path::new("")));

    let mut dir = proxy_root.to_path_buf();
    let mut top_stripped = false;
    for component in source_dir.components() {
        match component {
            Component::Prefix(_) => top_stripped = true,
            Component::RootDir | Component::CurDir | Component::ParentDir => {}
            Component::Normal(name) => {
                if top_stripped {
                    dir.push(name);
                } else {
                    top_stripped = true;
                }
            }
        }
    }
    normalize(&dir)
}

/// Full path a linked proxy should have: the expected directory, the source's
/// stem and the proxy's own extension.
pub fn expected_proxy_file(
    proxy_root: &Path,
    record: &MediaRecord,
    proxy_ext: Option<&OsStr>,
) -> PathBuf {
    // Stems may contain dots, so the extension is appended rather than set
    let mut file_name = OsString::from(record.stem());
    if let Some(ext) = proxy_ext {
        file_name.push(".");
        file_name.push(ext);
    }
    expected_proxy_dir(proxy_root, &record.file_path).join(file_name)
}

/// Compare two proxy paths after normalization. Extensions compare case-insensitively.
pub fn same_proxy_path(a: &Path, b: &Path) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.with_extension("") != b.with_extension("") {
        return false;
    }
    let ext = |p: &Path| {
        p.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };
    ext(&a) == ext(&b)
}

/// A detected orphaned proxy and where it should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanMove {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

/// Find linked proxies (online or offline) that do not match the path convention.
pub fn detect_orphans<'a, I>(records: I, proxy_root: &Path) -> Vec<OrphanMove>
where
    I: IntoIterator<Item = &'a MediaRecord>,
{
    records
        .into_iter()
        .filter(|record| record.proxy_status != ProxyStatus::None)
        .filter_map(|record| {
            let linked = record.linked_proxy_path.as_ref()?;
            let expected = expected_proxy_file(proxy_root, record, linked.extension());
            if same_proxy_path(linked, &expected) {
                None
            } else {
                Some(OrphanMove {
                    old_path: linked.clone(),
                    new_path: expected,
                })
            }
        })
        .collect()
}

/// Detect orphans and, if the operator agrees, move them into place.
///
/// A failed move is reported and skipped; the remaining moves still run.
pub fn reconcile_orphans<'a, I>(
    records: I,
    proxy_root: &Path,
    prompt: &dyn Prompt,
    summary: &mut RunSummary,
) -> Result<(), ReconcileError>
where
    I: IntoIterator<Item = &'a MediaRecord>,
{
    info!("Checking for orphaned proxies.");
    let orphans = detect_orphans(records, proxy_root);
    if orphans.is_empty() {
        info!("Found none.");
        return Ok(());
    }

    info!("Orphaned proxies: {}", orphans.len());
    summary.orphans_found = orphans.len();
    summary.prompts_shown += 1;

    let answer = prompt.confirm_tri_state(
        "Orphaned proxies",
        &format!(
            "{} clip(s) have orphaned proxy media. \
             Would you like to attempt to automatically move these proxies \
             to the up-to-date proxy folder?",
            orphans.len()
        ),
    )?;

    match answer {
        Answer::Yes => {
            for orphan in &orphans {
                match move_proxy(&orphan.old_path, &orphan.new_path) {
                    Ok(MoveOutcome::Moved) => {
                        info!(
                            "Moved {} -> {}",
                            orphan.old_path.display(),
                            orphan.new_path.display()
                        );
                        summary.orphans_moved += 1;
                    }
                    Ok(MoveOutcome::AlreadyInPlace) => {
                        info!("Already in place: {}", orphan.new_path.display());
                        summary.orphans_moved += 1;
                    }
                    Err(e) => {
                        error!("Error moving orphaned proxy: {}", e);
                        prompt.alert("Error moving orphaned proxy", &e.to_string());
                        summary.orphans_failed += 1;
                    }
                }
            }
            Ok(())
        }
        Answer::No => {
            warn!("Leaving {} orphaned proxies in place.", orphans.len());
            Ok(())
        }
        Answer::Cancel => Err(ReconcileError::Cancelled(Step::OrphanedProxies)),
    }
}
