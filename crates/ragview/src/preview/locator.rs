//! Maps citations to fetchable artifact locations.
//!
//! Storage paths reported by the service are absolute paths on the service host. Only the
//! part after the last `storage` segment is meaningful to clients; it is mounted under
//! `{storage_base}/storage`.

use std::num::NonZeroU32;
use std::time::Duration;

use ragview_client::join_url;

use crate::chat::{Citation, FileType};

pub const STORAGE_MOUNT: &str = "storage";

/// Time-range numerals are hundredths of a second.
const TIME_RANGE_UNITS_PER_SECOND: f64 = 100.0;

/// What a citation renders as, with everything its acquisition needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactKind {
    Text {
        content: String,
    },
    Image {
        url: String,
    },
    Pdf {
        url: String,
        page: NonZeroU32,
    },
    Audio {
        url: String,
        start: Option<Duration>,
    },
    Unsupported {
        file_type: String,
        content: String,
    },
}

impl ArtifactKind {
    /// URL fetched during acquisition, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Image { url } | Self::Pdf { url, .. } | Self::Audio { url, .. } => Some(url),
            Self::Text { .. } | Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactLocation {
    /// Public URL of the stored artifact.
    pub url: String,
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    storage_base: String,
}

impl ArtifactLocator {
    pub fn new(storage_base: impl Into<String>) -> Self {
        Self {
            storage_base: storage_base.into().trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn storage_base(&self) -> &str {
        &self.storage_base
    }

    /// Public URL for a path relative to the storage mount.
    pub fn storage_url(&self, relative: &str) -> String {
        let mount = join_url(&self.storage_base, STORAGE_MOUNT);
        join_url(&mount, relative)
    }

    pub fn resolve(&self, citation: &Citation) -> ArtifactLocation {
        let suffix = citation
            .storage_path
            .as_deref()
            .map(storage_suffix)
            .unwrap_or_default();
        let url = self.storage_url(&suffix);

        let kind = match &citation.file_type {
            FileType::Text => ArtifactKind::Text {
                content: citation.content.clone().unwrap_or_default(),
            },
            FileType::Image => ArtifactKind::Image { url: url.clone() },
            FileType::Pdf => ArtifactKind::Pdf {
                url: url.clone(),
                page: citation.page_number.unwrap_or(NonZeroU32::MIN),
            },
            FileType::Audio => ArtifactKind::Audio {
                url: url.clone(),
                start: citation.time_range.as_deref().and_then(parse_time_offset),
            },
            FileType::Other(tag) => ArtifactKind::Unsupported {
                file_type: tag.clone(),
                content: citation.content.clone().unwrap_or_default(),
            },
        };

        ArtifactLocation { url, kind }
    }
}

/// Portion of a host path after its last `storage` segment, `/`-separated.
///
/// Paths without such a segment are taken to be relative to the mount already.
pub fn storage_suffix(path: &str) -> String {
    let normalized = path.trim().replace('\\', "/");
    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    let start = segments
        .iter()
        .rposition(|segment| *segment == STORAGE_MOUNT)
        .map_or(0, |index| index + 1);
    segments[start..].join("/")
}

/// Start offset of a `"start-end"` range.
///
/// Returns `None` when the leading numeral is missing, negative or not finite.
pub fn parse_time_offset(range: &str) -> Option<Duration> {
    let start = range.split('-').next()?.trim();
    let units: f64 = start.parse().ok()?;
    if !units.is_finite() || units < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(units / TIME_RANGE_UNITS_PER_SECOND).ok()
}
