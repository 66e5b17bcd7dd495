//! Types used by the client facade.

use bytes::Bytes;

/// Client statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    /// Media items published.
    pub media_published: u64,
    /// Media items deleted.
    pub media_deleted: u64,
    /// Checkout sessions started.
    pub sessions_started: u64,
    /// Payments resolved as completed.
    pub payments_completed: u64,
    /// Actions that ended in an error notice.
    pub errors: u64,
}

/// Profile fields an artist edits.
#[derive(Debug, Clone, Default)]
pub struct ProfileDraft {
    /// Display name.
    pub display_name: String,
    /// Short biography.
    pub bio: String,
    /// Links to other sites.
    pub external_links: Vec<String>,
    /// Whether the artist accepts donations.
    pub donations_enabled: bool,
    /// New profile picture, if changed.
    pub avatar: Option<Bytes>,
}

impl ProfileDraft {
    /// A draft with only a display name.
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    /// Set the biography.
    #[must_use]
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = bio.into();
        self
    }

    /// Opt in or out of donations.
    #[must_use]
    pub fn with_donations(mut self, enabled: bool) -> Self {
        self.donations_enabled = enabled;
        self
    }

    /// Attach a new profile picture.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<Bytes>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}
