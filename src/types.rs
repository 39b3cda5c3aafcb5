use chrono::{DateTime, Utc};
use std::fmt;

/// Link relation that marks the bookmarked article itself.
pub const RELATED_REL: &str = "related";

// ============================================================================
// Feed Model
// ============================================================================

/// A typed link from an Atom `<link>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Value of the `rel` attribute (`related`, `alternate`, `service.edit`, ...).
    pub rel: String,
    /// Value of the `href` attribute.
    pub href: String,
}

impl Link {
    pub fn is_related(&self) -> bool {
        self.rel == RELATED_REL
    }
}

/// One bookmark item as it appears in the exported feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    /// Links in document order.
    pub links: Vec<Link>,
    /// `<dc:subject>` values in document order. Empty, never absent.
    pub tags: Vec<String>,
    /// `<issued>` instant; older exports omit the element.
    pub issued: Option<DateTime<Utc>>,
}

// ============================================================================
// Normalized Record
// ============================================================================

/// Import state applied to every record of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Succeeded,
    Archived,
}

impl SaveState {
    /// `ARCHIVED` when the archive flag is set, `SUCCEEDED` otherwise.
    pub fn from_archive_flag(archive: bool) -> Self {
        if archive {
            SaveState::Archived
        } else {
            SaveState::Succeeded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaveState::Succeeded => "SUCCEEDED",
            SaveState::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (entry, related link) pair, ready for CSV encoding.
///
/// Entries with several `related` links produce one record per link, all
/// sharing the entry's title, tags and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRecord {
    /// Carried for diagnostics; the import format has no title column.
    pub title: String,
    pub url: String,
    pub state: SaveState,
    pub tags: Vec<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl BookmarkRecord {
    /// Unix epoch seconds of `saved_at`, if known.
    pub fn saved_at_epoch(&self) -> Option<i64> {
        self.saved_at.map(|dt| dt.timestamp())
    }
}
