//! Timeline Source: where clips come from and where proxies get linked.
//!
//! The editing application is reached through [`TimelineSource`]. The shipped
//! implementation, [`ExportedTimeline`], reads a JSON timeline export and writes
//! proxy links back into it.

use crate::media::{ClipAttributes, ATTR_FILE_PATH, ATTR_PROXY, ATTR_PROXY_MEDIA_PATH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Value written to the `Proxy` attribute of clips linked by this tool.
pub const LINKED_PROXY_LABEL: &str = "Linked";

/// Errors raised by a Timeline Source.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Failed to read timeline export {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse timeline export {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write timeline export {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    /// The timeline has no video tracks to take clips from.
    #[error("Timeline '{0}' has no usable video tracks")]
    NoTracks(String),
}

/// One item on a video track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    /// Item name as shown on the timeline, usually the source file name.
    pub name: String,
    /// Attributes of the linked media record; `None` when the item has no media.
    #[serde(default)]
    pub media: Option<ClipAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    #[serde(default)]
    pub items: Vec<TimelineItem>,
}

/// Source of timeline clips and target of proxy links.
pub trait TimelineSource {
    fn project_name(&self) -> &str;

    fn timeline_name(&self) -> &str;

    /// Every video track on the timeline, in order.
    fn video_tracks(&self) -> Result<Vec<VideoTrack>, TimelineError>;

    /// Link proxy files to the clips whose source media they were rendered from.
    ///
    /// Returns the number of timeline items that were linked.
    fn link_proxies(&mut self, links: &[ProxyLink]) -> Result<usize, TimelineError>;
}

/// A proxy file and the source media it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLink {
    pub source: PathBuf,
    pub proxy: PathBuf,
}

/// On-disk timeline export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineExport {
    pub project: String,
    pub timeline: String,
    #[serde(default)]
    pub tracks: Vec<VideoTrack>,
}

/// Timeline Source backed by a JSON export file.
#[derive(Debug)]
pub struct ExportedTimeline {
    path: PathBuf,
    export: TimelineExport,
}

impl ExportedTimeline {
    /// Load a timeline export from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TimelineError> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| TimelineError::Read {
            path: path.clone(),
            source,
        })?;
        let export = serde_json::from_str(&content).map_err(|source| TimelineError::Parse {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, export })
    }

    pub fn export(&self) -> &TimelineExport {
        &self.export
    }

    fn save(&self) -> Result<(), TimelineError> {
        let write_err = |source| TimelineError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(&self.export)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

impl TimelineSource for ExportedTimeline {
    fn project_name(&self) -> &str {
        &self.export.project
    }

    fn timeline_name(&self) -> &str {
        &self.export.timeline
    }

    fn video_tracks(&self) -> Result<Vec<VideoTrack>, TimelineError> {
        if self.export.tracks.is_empty() {
            return Err(TimelineError::NoTracks(self.export.timeline.clone()));
        }
        Ok(self.export.tracks.clone())
    }

    fn link_proxies(&mut self, links: &[ProxyLink]) -> Result<usize, TimelineError> {
        let linked = link_matching_items(&mut self.export.tracks, links);
        if linked > 0 {
            self.save()?;
        }
        Ok(linked)
    }
}

/// Point every item whose source media has a link at that link's proxy.
///
/// Several items can share one source; all of them are linked.
pub fn link_matching_items(tracks: &mut [VideoTrack], links: &[ProxyLink]) -> usize {
    let mut linked = 0;

    for item in tracks.iter_mut().flat_map(|t| t.items.iter_mut()) {
        let Some(media) = item.media.as_mut() else {
            continue;
        };
        let Some(source) = media.get(ATTR_FILE_PATH).map(PathBuf::from) else {
            continue;
        };

        if let Some(link) = links.iter().find(|link| link.source == source) {
            media.insert(ATTR_PROXY.to_string(), LINKED_PROXY_LABEL.to_string());
            media.insert(
                ATTR_PROXY_MEDIA_PATH.to_string(),
                link.proxy.to_string_lossy().into_owned(),
            );
            linked += 1;
        }
    }

    linked
}
