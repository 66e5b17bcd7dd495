//! Query keys, invalidation scopes and the mutation table.

use crate::backend::{ArtistId, MediaId, SessionId};
use crate::media::MediaCategory;
use std::fmt;

/// Identity of one cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Every published media item.
    AllMedia,
    /// Media published by one artist.
    ArtistMedia(ArtistId),
    /// Media in one category.
    CategoryMedia(MediaCategory),
    /// One media item with its artist and donation totals.
    MediaItem(MediaId),
    /// Every media item with artist and donation totals.
    MediaWithDonationContext,
    /// The calling artist's profile.
    CurrentArtist,
    /// Another artist's profile.
    Artist(ArtistId),
    /// Whether an artist accepts donations.
    DonationsEnabled(ArtistId),
    /// Whether the platform gateway is configured.
    GatewayConfigured,
    /// Status of a checkout session.
    SessionStatus(SessionId),
}

/// A key with its parameter erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeFamily {
    /// [`QueryKey::AllMedia`].
    AllMedia,
    /// [`QueryKey::ArtistMedia`].
    ArtistMedia,
    /// [`QueryKey::CategoryMedia`].
    CategoryMedia,
    /// [`QueryKey::MediaItem`].
    MediaItem,
    /// [`QueryKey::MediaWithDonationContext`].
    MediaWithDonationContext,
    /// [`QueryKey::CurrentArtist`].
    CurrentArtist,
    /// [`QueryKey::Artist`].
    Artist,
    /// [`QueryKey::DonationsEnabled`].
    DonationsEnabled,
    /// [`QueryKey::GatewayConfigured`].
    GatewayConfigured,
    /// [`QueryKey::SessionStatus`].
    SessionStatus,
}

impl QueryKey {
    /// Family this key belongs to.
    #[must_use]
    pub const fn family(&self) -> ScopeFamily {
        match self {
            Self::AllMedia => ScopeFamily::AllMedia,
            Self::ArtistMedia(_) => ScopeFamily::ArtistMedia,
            Self::CategoryMedia(_) => ScopeFamily::CategoryMedia,
            Self::MediaItem(_) => ScopeFamily::MediaItem,
            Self::MediaWithDonationContext => ScopeFamily::MediaWithDonationContext,
            Self::CurrentArtist => ScopeFamily::CurrentArtist,
            Self::Artist(_) => ScopeFamily::Artist,
            Self::DonationsEnabled(_) => ScopeFamily::DonationsEnabled,
            Self::GatewayConfigured => ScopeFamily::GatewayConfigured,
            Self::SessionStatus(_) => ScopeFamily::SessionStatus,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllMedia => f.write_str("allMedia"),
            Self::ArtistMedia(id) => write!(f, "artistMedia/{id}"),
            Self::CategoryMedia(category) => write!(f, "categoryMedia/{category}"),
            Self::MediaItem(id) => write!(f, "mediaItem/{id}"),
            Self::MediaWithDonationContext => f.write_str("mediaWithDonationContext"),
            Self::CurrentArtist => f.write_str("currentArtist"),
            Self::Artist(id) => write!(f, "artist/{id}"),
            Self::DonationsEnabled(id) => write!(f, "donationsEnabled/{id}"),
            Self::GatewayConfigured => f.write_str("gatewayConfigured"),
            Self::SessionStatus(id) => write!(f, "sessionStatus/{id}"),
        }
    }
}

/// Set of keys an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopePattern {
    /// Every key of a family, whatever its parameter.
    Family(ScopeFamily),
    /// One exact key.
    Key(QueryKey),
}

impl ScopePattern {
    /// Whether `key` falls inside this scope.
    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Family(family) => key.family() == *family,
            Self::Key(exact) => exact == key,
        }
    }

    /// Family the scope belongs to.
    #[must_use]
    pub fn family(&self) -> ScopeFamily {
        match self {
            Self::Family(family) => *family,
            Self::Key(key) => key.family(),
        }
    }
}

/// A state-changing operation, as far as cached reads are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A media item was published.
    PublishMedia,
    /// A media item was deleted.
    DeleteMedia(MediaId),
    /// The caller became an artist.
    OnboardArtist,
    /// The caller's profile changed.
    UpdateProfile,
    /// The caller attached a gateway credential.
    AttachCredential,
    /// The caller removed their gateway credential.
    DetachCredential,
    /// The platform gateway configuration changed.
    ConfigureGateway,
    /// A checkout session was created.
    CreateCheckoutSession,
    /// A donation completed.
    PaymentCompleted {
        /// Media item the donation was for, when known.
        media_id: Option<MediaId>,
        /// Session that completed.
        session_id: SessionId,
    },
}

impl Mutation {
    /// Scopes whose cached reads this mutation makes stale.
    #[must_use]
    pub fn affected_scopes(&self) -> Vec<ScopePattern> {
        use ScopeFamily as F;
        use ScopePattern::{Family, Key};

        match self {
            Self::PublishMedia => vec![
                Family(F::AllMedia),
                Family(F::ArtistMedia),
                Family(F::CategoryMedia),
                Family(F::MediaWithDonationContext),
            ],
            Self::DeleteMedia(id) => vec![
                Family(F::AllMedia),
                Family(F::ArtistMedia),
                Family(F::CategoryMedia),
                Family(F::MediaWithDonationContext),
                Key(QueryKey::MediaItem(id.clone())),
            ],
            // Profiles carry the opt-in flag and are embedded in media cards.
            Self::OnboardArtist
            | Self::UpdateProfile
            | Self::AttachCredential
            | Self::DetachCredential => vec![
                Family(F::CurrentArtist),
                Family(F::Artist),
                Family(F::DonationsEnabled),
                Family(F::MediaItem),
                Family(F::MediaWithDonationContext),
            ],
            Self::ConfigureGateway => vec![Family(F::GatewayConfigured)],
            // Sessions are created without touching anything cached.
            Self::CreateCheckoutSession => Vec::new(),
            Self::PaymentCompleted {
                media_id,
                session_id,
            } => vec![
                media_id
                    .as_ref()
                    .map_or(Family(F::MediaItem), |id| Key(QueryKey::MediaItem(id.clone()))),
                Family(F::ArtistMedia),
                Family(F::MediaWithDonationContext),
                Family(F::AllMedia),
                Key(QueryKey::SessionStatus(session_id.clone())),
            ],
        }
    }
}
