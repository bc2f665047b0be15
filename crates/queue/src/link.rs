//! Link resolution for proxies that exist on disk but are not linked.
//!
//! Proxies that finished rendering but were never linked, or were unlinked by
//! hand, are linked again instead of being re-rendered.

use crate::media::{MediaRecord, ProxyStatus};
use crate::paths::expected_proxy_dir;
use crate::prompt::{Answer, Prompt};
use crate::reconcile::{ReconcileError, RunSummary, Step};
use crate::scan::{find_candidates, select_candidate};
use crate::timeline::{ProxyLink, TimelineSource};
use log::{error, info, warn};
use std::path::Path;

/// Annotate unlinked records with their expected proxy directory and any
/// existing proxy found there. Returns the number of records with a candidate.
pub fn annotate_existing(
    records: &mut [MediaRecord],
    proxy_root: &Path,
    revision_sep: &str,
) -> usize {
    let mut found = 0;

    for record in records
        .iter_mut()
        .filter(|r| r.proxy_status == ProxyStatus::None)
    {
        let dir = expected_proxy_dir(proxy_root, &record.file_path);
        let candidates = find_candidates(&dir, &record.stem(), revision_sep);

        record.existing_proxy = select_candidate(&candidates).map(|c| c.path.clone());
        record.expected_proxy_path = Some(dir);

        if record.existing_proxy.is_some() {
            found += 1;
        }
    }

    found
}

/// Offer to link existing proxies instead of re-rendering them.
///
/// Returns the records left to render. Linked records are removed; a record
/// whose proxy vanished before linking stays in the render set.
pub fn resolve_unlinked(
    mut records: Vec<MediaRecord>,
    proxy_root: &Path,
    revision_sep: &str,
    prompt: &dyn Prompt,
    timeline: &mut dyn TimelineSource,
    summary: &mut RunSummary,
) -> Result<Vec<MediaRecord>, ReconcileError> {
    info!("Checking for existing, unlinked media.");
    let found = annotate_existing(&mut records, proxy_root, revision_sep);
    if found == 0 {
        info!("Found none.");
        return Ok(records);
    }

    info!("Found {} unlinked", found);
    summary.unlinked_found = found;
    summary.prompts_shown += 1;

    let answer = prompt.confirm_tri_state(
        "Found unlinked proxy media",
        &format!(
            "{} clip(s) have existing but unlinked proxy media. \
             Would you like to link them? If you select 'No' they will be re-rendered.",
            found
        ),
    )?;

    match answer {
        Answer::Yes => link_existing(records, prompt, timeline, summary),
        Answer::No => {
            warn!("Existing proxies will be OVERWRITTEN!");
            Ok(records)
        }
        Answer::Cancel => Err(ReconcileError::Cancelled(Step::UnlinkedProxies)),
    }
}

fn link_existing(
    records: Vec<MediaRecord>,
    prompt: &dyn Prompt,
    timeline: &mut dyn TimelineSource,
    summary: &mut RunSummary,
) -> Result<Vec<MediaRecord>, ReconcileError> {
    info!("Linking proxy media");

    let mut links = Vec::new();
    let mut render = Vec::with_capacity(records.len());

    for mut record in records {
        let Some(proxy) = record.existing_proxy.take() else {
            render.push(record);
            continue;
        };

        if !proxy.exists() {
            let message = format!("Proxy media not found at '{}'", proxy.display());
            error!("Error linking proxy: {}", message);
            prompt.alert("Error linking proxy", &message);
            summary.link_failures += 1;
            render.push(record);
            continue;
        }

        links.push(ProxyLink {
            source: record.file_path.clone(),
            proxy,
        });
    }

    if !links.is_empty() {
        let items = timeline.link_proxies(&links)?;
        info!(
            "{} proxy(s) linked across {} timeline item(s), will not be queued.",
            links.len(),
            items
        );
    }
    summary.unlinked_linked = links.len();

    Ok(render)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::record;
    use crate::prompt::tests::ScriptedPrompt;
    use crate::timeline::tests::MemoryTimeline;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Proxy root with rendered proxies for clip001 and clip002.
    fn proxy_tree() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("proxies");
        let dir = root.join("proj").join("shoot1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("clip001.mov"), b"r0").unwrap();
        fs::write(dir.join("clip002.mov"), b"r0").unwrap();
        (temp_dir, root)
    }

    fn records() -> Vec<MediaRecord> {
        vec![
            record("/volumes/proj/shoot1/clip001.mov", "None", ""),
            record("/volumes/proj/shoot1/clip002.mov", "None", ""),
            record("/volumes/proj/shoot1/clip003.mov", "None", ""),
        ]
    }

    #[test]
    fn test_annotate_existing() {
        let (_guard, root) = proxy_tree();
        let mut records = records();

        let found = annotate_existing(&mut records, &root, "_v");
        assert_eq!(found, 2);
        assert_eq!(
            records[0].existing_proxy,
            Some(root.join("proj/shoot1/clip001.mov"))
        );
        assert_eq!(records[2].existing_proxy, None);
        assert_eq!(
            records[2].expected_proxy_path,
            Some(root.join("proj/shoot1"))
        );
    }

    #[test]
    fn test_yes_links_and_removes_from_render_set() {
        let (_guard, root) = proxy_tree();
        let prompt = ScriptedPrompt::new(&[Answer::Yes]);
        let mut timeline = MemoryTimeline::default();
        let mut summary = RunSummary::default();

        let render =
            resolve_unlinked(records(), &root, "_v", &prompt, &mut timeline, &mut summary).unwrap();

        assert_eq!(render.len(), 1);
        assert_eq!(render[0].file_name, "clip003.mov");
        assert_eq!(timeline.linked.len(), 2);
        assert_eq!(summary.unlinked_linked, 2);
    }

    #[test]
    fn test_no_keeps_records_for_rendering() {
        let (_guard, root) = proxy_tree();
        let prompt = ScriptedPrompt::new(&[Answer::No]);
        let mut timeline = MemoryTimeline::default();
        let mut summary = RunSummary::default();

        let render =
            resolve_unlinked(records(), &root, "_v", &prompt, &mut timeline, &mut summary).unwrap();

        assert_eq!(render.len(), 3);
        assert!(timeline.linked.is_empty());
        assert_eq!(summary.unlinked_found, 2);
    }

    #[test]
    fn test_cancel_aborts() {
        let (_guard, root) = proxy_tree();
        let prompt = ScriptedPrompt::new(&[Answer::Cancel]);
        let mut timeline = MemoryTimeline::default();
        let mut summary = RunSummary::default();

        let result = resolve_unlinked(records(), &root, "_v", &prompt, &mut timeline, &mut summary);
        assert!(matches!(
            result,
            Err(ReconcileError::Cancelled(Step::UnlinkedProxies))
        ));
    }

    #[test]
    fn test_vanished_proxy_reports_and_continues() {
        let (_guard, root) = proxy_tree();
        let mut records = records();
        annotate_existing(&mut records, &root, "_v");
        fs::remove_file(root.join("proj/shoot1/clip001.mov")).unwrap();

        let prompt = ScriptedPrompt::default();
        let mut timeline = MemoryTimeline::default();
        let mut summary = RunSummary::default();
        let render = link_existing(records, &prompt, &mut timeline, &mut summary).unwrap();

        assert_eq!(summary.link_failures, 1);
        assert_eq!(summary.unlinked_linked, 1);
        assert_eq!(prompt.alerts.borrow().len(), 1);
        let names: Vec<_> = render.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["clip001.mov", "clip003.mov"]);
    }

    #[test]
    fn test_nothing_on_disk_never_prompts() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = ScriptedPrompt::default();
        let mut timeline = MemoryTimeline::default();
        let mut summary = RunSummary::default();

        let render = resolve_unlinked(
            records(),
            temp_dir.path(),
            "_v",
            &prompt,
            &mut timeline,
            &mut summary,
        )
        .unwrap();
        assert_eq!(render.len(), 3);
        assert!(prompt.asked.borrow().is_empty());
    }
}
