//! Media catalog: unique source media referenced by a timeline.
//!
//! Many timeline items usually point at the same source clip. The catalog
//! collapses them so each source is reconciled and rendered once.

use crate::media::{ClipAttributes, MediaError, MediaRecord};
use crate::timeline::VideoTrack;
use log::{debug, warn};
use std::collections::HashSet;

/// Clips collected from the timeline's video tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedClips {
    /// Attribute mappings, one per accepted timeline item (not deduplicated).
    pub clips: Vec<ClipAttributes>,
    /// Names of accepted items that had no linked media record.
    pub missing_media: Vec<String>,
}

/// Checks if a timeline item name carries an acceptable extension (case-insensitive).
pub fn has_acceptable_ext(name: &str, acceptable_exts: &[String]) -> bool {
    let name = name.to_lowercase();
    acceptable_exts
        .iter()
        .any(|ext| name.contains(&ext.to_lowercase()))
}

/// Collect the media attributes of every accepted item on every video track.
pub fn collect_clips(tracks: &[VideoTrack], acceptable_exts: &[String]) -> CollectedClips {
    let mut collected = CollectedClips::default();

    for (index, track) in tracks.iter().enumerate() {
        if track.items.is_empty() {
            debug!("No items found in track {}", index + 1);
            continue;
        }

        for item in &track.items {
            if !has_acceptable_ext(&item.name, acceptable_exts) {
                continue;
            }
            match &item.media {
                Some(attrs) => collected.clips.push(attrs.clone()),
                None => {
                    warn!("Skipping {}, no linked media pool item", item.name);
                    collected.missing_media.push(item.name.clone());
                }
            }
        }
    }

    collected
}

/// Unique media records built from raw clips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaCatalog {
    /// One record per distinct attribute set, in order of first occurrence.
    pub records: Vec<MediaRecord>,
    /// Number of clips the catalog was built from, duplicates included.
    pub total_clips: usize,
    /// Distinct clips that failed validation.
    pub rejected: Vec<(ClipAttributes, MediaError)>,
}

impl MediaCatalog {
    /// Deduplicate clips by their full attribute set and validate each survivor.
    ///
    /// Two clips are the same media only if every attribute matches; attribute
    /// order never matters because attributes are kept in sorted maps. Clips
    /// whose attributes differ only in spelling (`Proxy` of `""` or `"None"`)
    /// normalize to one record, so records are deduplicated again.
    pub fn build(clips: Vec<ClipAttributes>) -> Self {
        let total_clips = clips.len();
        let unique = dedup_clips(clips);

        let mut seen = HashSet::with_capacity(unique.len());
        let mut records = Vec::with_capacity(unique.len());
        let mut rejected = Vec::new();
        for attrs in unique {
            match MediaRecord::from_attributes(&attrs) {
                Ok(record) => {
                    if seen.insert(record.clone()) {
                        records.push(record);
                    } else {
                        debug!("Clip {} normalizes to a record already seen", record.file_name);
                    }
                }
                Err(e) => {
                    warn!("Skipping clip with invalid attributes: {}", e);
                    rejected.push((attrs, e));
                }
            }
        }

        Self {
            records,
            total_clips,
            rejected,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<MediaRecord> {
        self.records
    }
}

/// Drop attribute-for-attribute duplicates, keeping the first occurrence.
pub fn dedup_clips(clips: Vec<ClipAttributes>) -> Vec<ClipAttributes> {
    let mut seen = HashSet::with_capacity(clips.len());
    clips
        .into_iter()
        .filter(|attrs| seen.insert(attrs.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::clip_attrs;
    use crate::timeline::TimelineItem;
    use proptest::prelude::*;

    fn exts() -> Vec<String> {
        vec![".mov".to_string(), ".mp4".to_string()]
    }

    #[test]
    fn test_has_acceptable_ext() {
        assert!(has_acceptable_ext("clip001.mov", &exts()));
        assert!(has_acceptable_ext("CLIP001.MOV", &exts()));
        assert!(has_acceptable_ext("clip001.mp4 - subclip", &exts()));
        assert!(!has_acceptable_ext("Title card", &exts()));
        assert!(!has_acceptable_ext("music.wav", &exts()));
    }

    #[test]
    fn test_collect_clips_filters_and_reports_missing_media() {
        let tracks = vec![
            VideoTrack {
                items: vec![
                    TimelineItem {
                        name: "clip001.mov".to_string(),
                        media: Some(clip_attrs("/v/p/clip001.mov", "None", "")),
                    },
                    TimelineItem {
                        name: "Adjustment clip".to_string(),
                        media: None,
                    },
                    TimelineItem {
                        name: "clip002.mov".to_string(),
                        media: None,
                    },
                ],
            },
            VideoTrack::default(),
            VideoTrack {
                items: vec![TimelineItem {
                    name: "clip001.mov".to_string(),
                    media: Some(clip_attrs("/v/p/clip001.mov", "None", "")),
                }],
            },
        ];

        let collected = collect_clips(&tracks, &exts());
        assert_eq!(collected.clips.len(), 2);
        assert_eq!(collected.missing_media, vec!["clip002.mov".to_string()]);
    }

    #[test]
    fn test_build_dedups_and_rejects() {
        let mut invalid = clip_attrs("/v/p/bad.mov", "None", "");
        invalid.remove("File Name");

        let clips = vec![
            clip_attrs("/v/p/clip001.mov", "None", ""),
            clip_attrs("/v/p/clip001.mov", "None", ""),
            clip_attrs("/v/p/clip002.mov", "None", ""),
            invalid,
        ];

        let catalog = MediaCatalog::build(clips);
        assert_eq!(catalog.total_clips, 4);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.rejected.len(), 1);
    }

    #[test]
    fn test_same_path_different_attributes_kept_apart() {
        // Deduplication is by full attribute set, not by path
        let mut other = clip_attrs("/v/p/clip001.mov", "None", "");
        other.insert("Clip Color".to_string(), "Orange".to_string());

        let catalog = MediaCatalog::build(vec![clip_attrs("/v/p/clip001.mov", "None", ""), other]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_equivalent_proxy_spellings_yield_one_record() {
        let catalog = MediaCatalog::build(vec![
            clip_attrs("/v/p/clip001.mov", "None", ""),
            clip_attrs("/v/p/clip001.mov", "", ""),
        ]);
        assert_eq!(catalog.total_clips, 2);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.rejected.is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty_catalog() {
        let catalog = MediaCatalog::build(Vec::new());
        assert!(catalog.is_empty());
        assert_eq!(catalog.total_clips, 0);
    }

    fn clip_strategy() -> impl Strategy<Value = ClipAttributes> {
        (
            0u8..6,
            prop_oneof![Just("None"), Just(""), Just("Offline"), Just("1280x720")],
            any::<bool>(),
        )
            .prop_map(|(n, proxy, with_path)| {
                let proxy_path = if with_path || !matches!(proxy, "None" | "") {
                    format!("/proxies/proj/clip{:03}.mov", n)
                } else {
                    String::new()
                };
                clip_attrs(&format!("/volumes/proj/clip{:03}.mov", n), proxy, &proxy_path)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_dedup_size_equals_distinct_sets(
            clips in prop::collection::vec(clip_strategy(), 0..40),
        ) {
            let distinct: HashSet<MediaRecord> = clips
                .iter()
                .filter_map(|attrs| MediaRecord::from_attributes(attrs).ok())
                .collect();
            let catalog = MediaCatalog::build(clips.clone());

            prop_assert_eq!(catalog.len(), distinct.len());
            prop_assert_eq!(catalog.total_clips, clips.len());
            let built: HashSet<MediaRecord> = catalog.into_records().into_iter().collect();
            prop_assert_eq!(built, distinct);
        }

        #[test]
        fn prop_dedup_membership_is_order_independent(
            clips in prop::collection::vec(clip_strategy(), 0..40),
        ) {
            let mut reversed = clips.clone();
            reversed.reverse();

            let forward: HashSet<ClipAttributes> = dedup_clips(clips).into_iter().collect();
            let backward: HashSet<ClipAttributes> = dedup_clips(reversed).into_iter().collect();
            prop_assert_eq!(forward, backward);
        }
    }
}
