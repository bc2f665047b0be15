//! Media records built from timeline clip attributes.
//!
//! The Timeline Source reports each clip as a flat attribute mapping. Records
//! are validated here, once, so the rest of the pipeline works with a fixed shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Raw attributes of one timeline clip, keyed by attribute name.
pub type ClipAttributes = BTreeMap<String, String>;

pub const ATTR_FILE_PATH: &str = "File Path";
pub const ATTR_FILE_NAME: &str = "File Name";
pub const ATTR_PROXY: &str = "Proxy";
pub const ATTR_PROXY_MEDIA_PATH: &str = "Proxy Media Path";

/// Errors raised when clip attributes cannot form a media record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("clip is missing required attribute '{0}'")]
    MissingAttribute(&'static str),

    #[error("clip has a linked proxy status but no 'Proxy Media Path'")]
    MissingProxyPath,
}

/// Proxy linkage as reported by the Timeline Source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyStatus {
    /// No proxy linked.
    None,
    /// A proxy is linked and online.
    Linked,
    /// A proxy is linked but its file cannot be found.
    Offline,
}

impl ProxyStatus {
    /// Parse the `Proxy` attribute. Anything other than `None` or `Offline`
    /// (usually a resolution such as `1280x720`) means a proxy is linked.
    pub fn from_attribute(value: &str) -> Self {
        match value.trim() {
            "" | "None" => ProxyStatus::None,
            "Offline" => ProxyStatus::Offline,
            _ => ProxyStatus::Linked,
        }
    }
}

impl std::fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyStatus::None => write!(f, "None"),
            ProxyStatus::Linked => write!(f, "Linked"),
            ProxyStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// One unique source clip and its proxy state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRecord {
    #[serde(rename = "File Path")]
    pub file_path: PathBuf,
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Proxy")]
    pub proxy_status: ProxyStatus,
    /// Proxy currently linked in the project; `None` when nothing is linked.
    #[serde(rename = "Proxy Media Path", skip_serializing_if = "Option::is_none", default)]
    pub linked_proxy_path: Option<PathBuf>,
    #[serde(rename = "Expected Proxy Path", skip_serializing_if = "Option::is_none", default)]
    pub expected_proxy_path: Option<PathBuf>,
    /// Unlinked proxy found on disk for this clip.
    #[serde(rename = "Existing Proxy", skip_serializing_if = "Option::is_none", default)]
    pub existing_proxy: Option<PathBuf>,
    /// Every other attribute the Timeline Source reported, passed through to jobs.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl MediaRecord {
    /// Build a record from raw clip attributes.
    pub fn from_attributes(attrs: &ClipAttributes) -> Result<Self, MediaError> {
        let file_path = required(attrs, ATTR_FILE_PATH)?;
        let file_name = required(attrs, ATTR_FILE_NAME)?;
        let proxy_status = attrs
            .get(ATTR_PROXY)
            .map(|v| ProxyStatus::from_attribute(v))
            .unwrap_or(ProxyStatus::None);

        let linked_proxy_path = attrs
            .get(ATTR_PROXY_MEDIA_PATH)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let linked_proxy_path = match proxy_status {
            ProxyStatus::None => None,
            _ => Some(linked_proxy_path.ok_or(MediaError::MissingProxyPath)?),
        };

        let attributes = attrs
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    ATTR_FILE_PATH | ATTR_FILE_NAME | ATTR_PROXY | ATTR_PROXY_MEDIA_PATH
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            file_path: PathBuf::from(file_path),
            file_name: file_name.to_string(),
            proxy_status,
            linked_proxy_path,
            expected_proxy_path: None,
            existing_proxy: None,
            attributes,
        })
    }

    /// Source file name without its extension.
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .or_else(|| self.file_path.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn required<'a>(attrs: &'a ClipAttributes, key: &'static str) -> Result<&'a str, MediaError> {
    attrs
        .get(key)
        .map(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
        .ok_or(MediaError::MissingAttribute(key))
}
