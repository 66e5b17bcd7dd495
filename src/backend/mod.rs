//! Backend operations consumed by the client.
//!
//! The backend owns blobs, media records, artist profiles and checkout
//! sessions. The client only reaches it through the [`Backend`] trait:
//!
//! - [`HttpBackend`] talks to the deployed API over HTTP.
//! - [`MemoryBackend`] keeps everything in process, for tests and offline use.
//!
//! A [`BackendSlot`] holds the live handle. While the slot is empty every
//! dependent operation is skipped with [`Error::BackendUnavailable`] instead
//! of attempting a call.

mod data_types;
mod http;
mod memory;

pub use data_types::{
    ArtistId, ArtistProfile, BlobReference, GatewayConfiguration, MediaCard, MediaId, MediaItem,
    MediaItemInput, SessionId, SessionStatus, ShoppingItem,
};
pub use http::HttpBackend;
pub use memory::MemoryBackend;

use crate::error::{Error, Result};
use crate::media::MediaCategory;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;

/// Callback the transport reports raw upload percentages to.
///
/// Values may repeat or arrive out of order; consumers clamp them.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Operations the backend exposes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Store raw bytes and return a reference once storage acknowledges them.
    async fn store_blob_bytes(&self, bytes: Bytes, progress: ProgressFn) -> Result<BlobReference>;

    /// Ask storage to ingest the content behind a URL.
    async fn store_blob_from_url(&self, url: &str) -> Result<BlobReference>;

    /// Create a checkout session. Returns the encoded session envelope.
    async fn create_checkout_session(
        &self,
        items: &[ShoppingItem],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String>;

    /// Look up the status of a checkout session.
    async fn get_session_status(&self, session_id: &SessionId) -> Result<SessionStatus>;

    /// Whether an artist accepts donations (opted in and holding a credential).
    async fn is_donations_enabled(&self, artist: &ArtistId) -> Result<bool>;

    /// Whether the platform gateway is configured.
    async fn is_gateway_configured(&self) -> Result<bool>;

    /// Set the platform gateway configuration.
    async fn set_gateway_configuration(&self, config: &GatewayConfiguration) -> Result<()>;

    /// Attach a gateway credential to the calling artist.
    async fn attach_payment_credential(&self, token: &str) -> Result<()>;

    /// Remove the calling artist's gateway credential.
    async fn detach_payment_credential(&self) -> Result<()>;

    /// Publish a media item.
    async fn publish_media(&self, input: &MediaItemInput) -> Result<MediaId>;

    /// Delete a media item.
    async fn delete_media(&self, media_id: &MediaId) -> Result<()>;

    /// All published media.
    async fn list_media(&self) -> Result<Vec<MediaItem>>;

    /// Media published by one artist.
    async fn media_by_artist(&self, artist: &ArtistId) -> Result<Vec<MediaItem>>;

    /// Media in one category.
    async fn media_by_category(&self, category: MediaCategory) -> Result<Vec<MediaItem>>;

    /// A media item with artist and donation totals.
    async fn media_card(&self, media_id: &MediaId) -> Result<Option<MediaCard>>;

    /// Every media item with artist and donation totals.
    async fn media_cards(&self) -> Result<Vec<MediaCard>>;

    /// The calling artist's profile.
    async fn caller_artist(&self) -> Result<Option<ArtistProfile>>;

    /// An artist's profile.
    async fn artist(&self, artist: &ArtistId) -> Result<Option<ArtistProfile>>;

    /// Create the calling artist's profile.
    async fn onboard_artist(&self, profile: &ArtistProfile) -> Result<()>;

    /// Replace the calling artist's profile.
    async fn update_artist(&self, profile: &ArtistProfile) -> Result<()>;
}

/// Holder for the live backend handle.
#[derive(Clone, Default)]
pub struct BackendSlot {
    inner: Arc<RwLock<Option<Arc<dyn Backend>>>>,
}

impl BackendSlot {
    /// An empty slot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A slot already holding a backend.
    #[must_use]
    pub fn connected(backend: Arc<dyn Backend>) -> Self {
        let slot = Self::default();
        slot.connect(backend);
        slot
    }

    /// Install a backend handle.
    pub fn connect(&self, backend: Arc<dyn Backend>) {
        *self.inner.write() = Some(backend);
    }

    /// Drop the backend handle.
    pub fn disconnect(&self) {
        *self.inner.write() = None;
    }

    /// Whether a backend handle is installed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.read().is_some()
    }

    /// The current backend handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] while the slot is empty.
    pub fn get(&self) -> Result<Arc<dyn Backend>> {
        self.inner.read().clone().ok_or(Error::BackendUnavailable)
    }
}
