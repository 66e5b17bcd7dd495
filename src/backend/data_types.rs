//! Data types exchanged with the backend.
//!
//! These mirror the backend's declared records. Identifiers are opaque strings
//! wrapped in newtypes so media, artist and session ids cannot be mixed up.

use crate::media::MediaCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a published media item.
    MediaId
);
string_id!(
    /// Identifier (principal text) of an artist.
    ArtistId
);
string_id!(
    /// Identifier of a gateway checkout session.
    SessionId
);

/// Opaque, immutable pointer to a blob acknowledged by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobReference {
    /// Storage key.
    pub key: String,
    /// URL the content can be fetched from directly.
    pub url: String,
    /// Content length in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the stored content.
    pub sha256: String,
}

impl BlobReference {
    /// URL the blob can be fetched from.
    #[must_use]
    pub fn direct_url(&self) -> &str {
        &self.url
    }
}

/// A published media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Media identifier.
    pub id: MediaId,
    /// Title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Category.
    pub category: MediaCategory,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Owning artist.
    pub artist_id: ArtistId,
    /// Stored media file.
    pub file: BlobReference,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// Input for publishing a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemInput {
    /// Title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Category.
    pub category: MediaCategory,
    /// Tags.
    pub tags: Vec<String>,
    /// Owning artist.
    pub artist_id: ArtistId,
    /// Already uploaded media file.
    pub file: BlobReference,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// An artist's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistProfile {
    /// Name shown to listeners.
    pub display_name: String,
    /// Biography.
    #[serde(default)]
    pub bio: String,
    /// Links to other platforms.
    #[serde(default)]
    pub external_links: Vec<String>,
    /// Whether the artist opted in to donations.
    #[serde(default)]
    pub donations_enabled: bool,
    /// Whether a gateway credential is attached. The credential itself never
    /// leaves the backend.
    #[serde(default)]
    pub has_gateway_credential: bool,
    /// Avatar image.
    #[serde(default)]
    pub avatar: Option<BlobReference>,
}

/// A media item together with its artist and donation totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCard {
    /// The media item.
    pub media: MediaItem,
    /// Its artist.
    pub artist: ArtistProfile,
    /// Donations received for this item, in minor units.
    pub media_donations: u64,
    /// Donations received by the artist overall, in minor units.
    pub artist_donations: u64,
}

/// One purchasable line in a checkout cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    /// Product name.
    pub product_name: String,
    /// Product description.
    pub product_description: String,
    /// Unit price in minor currency units.
    #[serde(rename = "priceInCents")]
    pub price_minor: u64,
    /// Quantity.
    pub quantity: u64,
    /// Lowercase ISO currency code.
    pub currency: String,
}

impl ShoppingItem {
    /// Line total in minor units, `None` on overflow.
    #[must_use]
    pub fn total_minor(&self) -> Option<u64> {
        self.price_minor.checked_mul(self.quantity)
    }
}

/// Status of a checkout session as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionStatus {
    /// Payment went through.
    Completed {
        /// Opaque gateway response.
        response: String,
        /// Identity the gateway resolved for the payer.
        #[serde(default, rename = "userPrincipal")]
        user_principal: Option<String>,
    },
    /// Payment did not go through.
    Failed {
        /// Gateway error.
        error: String,
    },
}

/// Platform-wide gateway configuration (admin only).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfiguration {
    /// Countries the gateway accepts payments from.
    pub allowed_countries: Vec<String>,
    /// Gateway secret key.
    pub secret_key: String,
}

impl fmt::Debug for GatewayConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfiguration")
            .field("allowed_countries", &self.allowed_countries)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
