//! Media categories and publishing drafts.
//!
//! `MediaCategory` is a closed set. Every presentation concern (icon, label,
//! player widget) is an exhaustive `match`, so adding a category fails to
//! compile until each table handles it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of published media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaCategory {
    /// Studio recording.
    #[default]
    Recording,
    /// Recorded live session.
    LiveSession,
    /// Video.
    Video,
}

/// Icon shown next to a category badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryIcon {
    /// Musical note.
    Music,
    /// Microphone.
    Mic,
    /// Film camera.
    Video,
}

/// Widget used to play a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    /// Audio player.
    Audio,
    /// Video player.
    Video,
}

impl MediaCategory {
    /// All categories, in display order.
    pub const ALL: [Self; 3] = [Self::Recording, Self::LiveSession, Self::Video];

    /// Icon for the category badge.
    #[must_use]
    pub const fn icon(self) -> CategoryIcon {
        match self {
            Self::Recording => CategoryIcon::Music,
            Self::LiveSession => CategoryIcon::Mic,
            Self::Video => CategoryIcon::Video,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Recording => "Recording",
            Self::LiveSession => "Live Session",
            Self::Video => "Video",
        }
    }

    /// Player widget for files of this category.
    #[must_use]
    pub const fn player(self) -> PlayerKind {
        match self {
            Self::Recording | Self::LiveSession => PlayerKind::Audio,
            Self::Video => PlayerKind::Video,
        }
    }

    /// Wire and URL slug.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::LiveSession => "liveSession",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for MediaCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::Validation(format!("unknown media category: {s}")))
    }
}

/// Split a comma-separated tag field into trimmed, non-empty tags.
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Title suggested for a file: its name without the last extension.
#[must_use]
pub fn title_from_file_name(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name.to_string(),
    }
}

/// A media file staged for publishing.
#[derive(Debug, Clone)]
pub struct MediaDraft {
    /// File contents.
    pub bytes: Bytes,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Category.
    pub category: MediaCategory,
    /// Tags.
    pub tags: Vec<String>,
}

impl MediaDraft {
    /// Stage a file with defaults derived from its name.
    pub fn from_file(file_name: &str, bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            title: title_from_file_name(file_name),
            description: String::new(),
            category: MediaCategory::default(),
            tags: Vec::new(),
        }
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: MediaCategory) -> Self {
        self.category = category;
        self
    }

    /// Set tags from a comma-separated field.
    #[must_use]
    pub fn with_tags(mut self, raw: &str) -> Self {
        self.tags = parse_tags(raw);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check local preconditions.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty title or file.
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::Error::Validation("media title is required".into()));
        }
        if self.bytes.is_empty() {
            return Err(crate::Error::Validation("media file is empty".into()));
        }
        Ok(())
    }
}
