//! The client facade.
//!
//! ```text
//! action ──► upload / checkout ──► backend call ──► invalidate scopes ──► event
//!                                        │
//!                                      error ──► Notice
//! ```

use super::data_types::{ClientStats, ProfileDraft};
use crate::backend::{
    ArtistId, ArtistProfile, Backend, BackendSlot, BlobReference, GatewayConfiguration, MediaCard,
    MediaId, MediaItem, MediaItemInput, SessionId, SessionStatus,
};
use crate::cache::{CacheConsistencyManager, CacheStats, Mutation, QueryCache, QueryKey};
use crate::checkout::{
    parse_donation_amount, CheckoutSession, CheckoutSessionManager, DonationRequest,
    RedirectArrival,
};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, ClientEvent, ClientEventsChannel, ClientEventsSender};
use crate::media::{MediaCategory, MediaDraft};
use crate::notice::Notice;
use crate::payment::{Eligibility, EligibilityGate, PaymentOutcome, PaymentOutcomeResolver, Signal};
use crate::upload::{AssetClass, BlobUploadService, CancellationToken, UploadObserver, UploadRequest};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for every user action.
///
/// Wires the upload service, checkout manager, eligibility gate and cache to
/// one backend slot. Mutations invalidate the scopes they declare before
/// returning; errors are turned into a [`Notice`] by [`report`](Self::report).
pub struct BuskerClient {
    config: ClientConfig,
    backend: BackendSlot,
    identity: Option<ArtistId>,
    uploads: BlobUploadService,
    checkout: CheckoutSessionManager,
    cache: CacheConsistencyManager,
    gate: EligibilityGate,
    events: ClientEventsSender,
    stats: RwLock<ClientStats>,
}

impl BuskerClient {
    /// Create a client with the given configuration and no backend.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let backend = BackendSlot::empty();
        let (events, _rx) = create_event_channel();
        let cache = CacheConsistencyManager::new(QueryCache::with_capacity(config.cache.capacity))
            .with_events(events.clone());

        info!(
            "Creating busker client (cache_capacity={}, origin={})",
            config.cache.capacity, config.checkout.origin
        );

        Self {
            identity: config.backend.identity.clone().map(ArtistId::from),
            uploads: BlobUploadService::new(backend.clone(), config.upload.clone())
                .with_events(events.clone()),
            checkout: CheckoutSessionManager::new(backend.clone(), config.checkout.clone())
                .with_events(events.clone()),
            gate: EligibilityGate::new(backend.clone(), cache.clone()),
            cache,
            backend,
            events,
            config,
            stats: RwLock::new(ClientStats::default()),
        }
    }

    /// Create a client with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ClientConfig::default())
    }

    /// Connect a backend.
    #[must_use]
    pub fn with_backend(self, backend: Arc<dyn Backend>) -> Self {
        self.backend.connect(backend);
        self
    }

    /// Act as `identity` when publishing.
    #[must_use]
    pub fn with_identity(mut self, identity: ArtistId) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Install a backend handle.
    pub fn connect(&self, backend: Arc<dyn Backend>) {
        self.backend.connect(backend);
    }

    /// Drop the backend handle. Later actions fail with `BackendUnavailable`.
    pub fn disconnect(&self) {
        self.backend.disconnect();
    }

    /// Subscribe to client events.
    #[must_use]
    pub fn subscribe(&self) -> ClientEventsChannel {
        self.events.subscribe()
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upload service.
    #[must_use]
    pub fn uploads(&self) -> &BlobUploadService {
        &self.uploads
    }

    /// Cache manager.
    #[must_use]
    pub fn cache(&self) -> &CacheConsistencyManager {
        &self.cache
    }

    /// Client statistics.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        self.stats.read().clone()
    }

    /// Cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Turn an error into the notice shown to the user.
    pub fn report(&self, error: &Error) -> Notice {
        warn!("Action failed: {error}");
        self.stats.write().errors += 1;
        let _ = self.events.send(ClientEvent::Error {
            message: error.to_string(),
        });
        Notice::from_error(error)
    }

    fn identity(&self) -> Result<ArtistId> {
        self.identity
            .clone()
            .ok_or_else(|| Error::Validation("sign in to publish".into()))
    }

    // ---- Media -----------------------------------------------------------

    /// Upload a file and publish it as a media item.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an incomplete draft, a transfer error if
    /// the upload fails, or the backend error if publishing fails.
    pub async fn publish_media(
        &self,
        draft: MediaDraft,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<MediaId> {
        draft.validate()?;
        let artist_id = self.identity()?;
        let file = self
            .uploads
            .upload_with_cancel(
                draft.bytes.clone(),
                AssetClass::Media,
                observer,
                &CancellationToken::new(),
            )
            .await?;
        self.publish_uploaded(&draft, artist_id, file).await
    }

    /// Have storage fetch `url` and publish it with the draft's metadata.
    ///
    /// The draft's bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank title or bad URL, a transfer
    /// error if storage cannot fetch the URL, or the backend error if
    /// publishing fails.
    pub async fn publish_from_url(
        &self,
        url: &str,
        draft: MediaDraft,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<MediaId> {
        if draft.title.trim().is_empty() {
            return Err(Error::Validation("media title is required".into()));
        }
        let artist_id = self.identity()?;
        let file = self.uploads.upload_from_url(url, observer).await?;
        self.publish_uploaded(&draft, artist_id, file).await
    }

    /// Upload and publish several files concurrently.
    ///
    /// Results are in input order. A failed upload does not stop the others.
    pub async fn publish_batch(&self, drafts: Vec<MediaDraft>) -> Vec<Result<MediaId>> {
        let artist_id = match self.identity() {
            Ok(id) => id,
            Err(e) => {
                let message = e.to_string();
                return drafts
                    .iter()
                    .map(|_| Err(Error::Validation(message.clone())))
                    .collect();
            }
        };

        let mut results: Vec<Option<Result<MediaId>>> = Vec::with_capacity(drafts.len());
        let mut requests = Vec::new();
        let mut slots = Vec::new();
        for (index, draft) in drafts.iter().enumerate() {
            match draft.validate() {
                Ok(()) => {
                    requests.push(UploadRequest::media(draft.bytes.clone()));
                    slots.push(index);
                    results.push(None);
                }
                Err(e) => results.push(Some(Err(e))),
            }
        }

        let uploaded = self.uploads.upload_batch(requests).await;
        for (index, upload) in slots.into_iter().zip(uploaded) {
            let outcome = match upload {
                Ok(file) => {
                    self.publish_uploaded(&drafts[index], artist_id.clone(), file)
                        .await
                }
                Err(e) => Err(e),
            };
            results[index] = Some(outcome);
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(Error::Validation("draft skipped".into()))))
            .collect()
    }

    async fn publish_uploaded(
        &self,
        draft: &MediaDraft,
        artist_id: ArtistId,
        file: BlobReference,
    ) -> Result<MediaId> {
        let input = MediaItemInput {
            title: draft.title.trim().to_string(),
            description: draft.description.clone(),
            category: draft.category,
            tags: draft.tags.clone(),
            artist_id,
            file,
            created: chrono::Utc::now(),
        };
        let media_id = self.backend.get()?.publish_media(&input).await?;

        self.cache.invalidate(&Mutation::PublishMedia);
        self.stats.write().media_published += 1;
        let _ = self.events.send(ClientEvent::MediaPublished {
            media_id: media_id.to_string(),
        });
        info!("Published {media_id} ({})", input.category.label());
        Ok(media_id)
    }

    /// Delete a media item.
    ///
    /// # Errors
    ///
    /// Returns the backend error if deletion fails.
    pub async fn delete_media(&self, media_id: &MediaId) -> Result<()> {
        self.backend.get()?.delete_media(media_id).await?;

        self.cache.invalidate(&Mutation::DeleteMedia(media_id.clone()));
        self.stats.write().media_deleted += 1;
        let _ = self.events.send(ClientEvent::MediaDeleted {
            media_id: media_id.to_string(),
        });
        info!("Deleted {media_id}");
        Ok(())
    }

    // ---- Profile and gateway ---------------------------------------------

    /// Become an artist.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or oversized avatar, or the
    /// backend error.
    pub async fn onboard_artist(&self, draft: ProfileDraft) -> Result<()> {
        let profile = self.profile_from_draft(draft, None).await?;
        self.backend.get()?.onboard_artist(&profile).await?;
        self.cache.invalidate(&Mutation::OnboardArtist);
        Ok(())
    }

    /// Replace the caller's profile. An absent avatar keeps the current one.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or oversized avatar, or the
    /// backend error.
    pub async fn update_profile(&self, draft: ProfileDraft) -> Result<()> {
        let current = self.backend.get()?.caller_artist().await?;
        let profile = self
            .profile_from_draft(draft, current.and_then(|p| p.avatar))
            .await?;
        self.backend.get()?.update_artist(&profile).await?;
        self.cache.invalidate(&Mutation::UpdateProfile);
        Ok(())
    }

    async fn profile_from_draft(
        &self,
        draft: ProfileDraft,
        current_avatar: Option<BlobReference>,
    ) -> Result<ArtistProfile> {
        if draft.display_name.trim().is_empty() {
            return Err(Error::Validation("display name is required".into()));
        }
        let avatar = match draft.avatar {
            Some(bytes) => Some(
                self.uploads
                    .upload_with_cancel(
                        bytes,
                        AssetClass::Avatar,
                        Arc::new(crate::upload::NoopObserver),
                        &CancellationToken::new(),
                    )
                    .await?,
            ),
            None => current_avatar,
        };
        Ok(ArtistProfile {
            display_name: draft.display_name.trim().to_string(),
            bio: draft.bio,
            external_links: draft.external_links,
            donations_enabled: draft.donations_enabled,
            has_gateway_credential: false,
            avatar,
        })
    }

    /// Attach a gateway credential to the caller.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank token, or the backend error.
    pub async fn attach_credential(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Validation("gateway token is required".into()));
        }
        self.backend.get()?.attach_payment_credential(token).await?;
        self.cache.invalidate(&Mutation::AttachCredential);
        info!("Gateway credential attached");
        Ok(())
    }

    /// Remove the caller's gateway credential.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn detach_credential(&self) -> Result<()> {
        self.backend.get()?.detach_payment_credential().await?;
        self.cache.invalidate(&Mutation::DetachCredential);
        info!("Gateway credential removed");
        Ok(())
    }

    /// Set the platform gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank key, or the backend error.
    pub async fn configure_gateway(&self, config: &GatewayConfiguration) -> Result<()> {
        if config.secret_key.trim().is_empty() {
            return Err(Error::Validation("gateway secret key is required".into()));
        }
        self.backend.get()?.set_gateway_configuration(config).await?;
        self.cache.invalidate(&Mutation::ConfigureGateway);
        Ok(())
    }

    // ---- Donations -------------------------------------------------------

    /// Start a checkout for a prepared donation.
    ///
    /// # Errors
    ///
    /// See [`CheckoutSessionManager::create_session`].
    pub async fn start_donation(&self, donation: &DonationRequest) -> Result<CheckoutSession> {
        let session = self.checkout.start_donation(donation).await?;
        self.cache.invalidate(&Mutation::CreateCheckoutSession);
        self.stats.write().sessions_started += 1;
        Ok(session)
    }

    /// Donate `amount` (as typed by the listener) to a media item.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad amount or when the media item does
    /// not accept donations, otherwise as [`start_donation`](Self::start_donation).
    pub async fn donate(
        &self,
        media_id: &MediaId,
        amount: &str,
        message: Option<&str>,
        donor: Option<&str>,
    ) -> Result<CheckoutSession> {
        let amount_minor =
            parse_donation_amount(amount, self.config.checkout.minimum_minor_units)?;
        let card = self
            .media_card(media_id)
            .await?
            .ok_or_else(|| Error::Validation(format!("media {media_id} not found")))?;

        let eligibility = self.eligibility(&card.media.artist_id).await;
        if !eligibility.is_available() {
            return Err(Error::Validation(
                eligibility
                    .notice_text()
                    .unwrap_or("Donations are still loading")
                    .to_string(),
            ));
        }

        let mut donation = DonationRequest::new(
            media_id.clone(),
            card.media.title,
            card.artist.display_name,
            amount_minor,
        );
        if let Some(message) = message {
            donation = donation.with_message(message);
        }
        if let Some(donor) = donor {
            donation = donation.with_donor(donor);
        }
        self.start_donation(&donation).await
    }

    /// A resolver for the landing URL the payer returned to.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the URL is not a landing page.
    pub fn payment_resolver(&self, landing_url: &str) -> Result<PaymentOutcomeResolver> {
        let arrival = RedirectArrival::parse(landing_url)?;
        Ok(
            PaymentOutcomeResolver::new(arrival, self.backend.clone(), self.cache.clone())
                .with_events(self.events.clone()),
        )
    }

    /// Resolve the landing URL the payer returned to.
    ///
    /// Each call builds a fresh resolver and looks the session up again.
    /// A page visit that may resolve more than once (re-renders, retries)
    /// must hold one [`payment_resolver`](Self::payment_resolver) for the
    /// whole visit, so the session is looked up at most once.
    ///
    /// # Errors
    ///
    /// See [`PaymentOutcomeResolver::resolve`].
    pub async fn resolve_payment(&self, landing_url: &str) -> Result<PaymentOutcome> {
        let outcome = self.payment_resolver(landing_url)?.resolve().await?;
        if outcome.is_completed() {
            self.stats.write().payments_completed += 1;
        }
        Ok(outcome)
    }

    // ---- Eligibility -----------------------------------------------------

    /// Whether an artist accepts donations.
    pub async fn donations_enabled(&self, artist: &ArtistId) -> Signal<bool> {
        self.gate.donations_enabled(artist).await
    }

    /// Whether the platform gateway is configured.
    pub async fn gateway_configured(&self) -> Signal<bool> {
        self.gate.gateway_configured().await
    }

    /// Donation eligibility for an artist's media.
    pub async fn eligibility(&self, artist: &ArtistId) -> Eligibility {
        self.gate.check(artist).await
    }

    /// Donation eligibility on the caller's own dashboard.
    pub async fn own_eligibility(&self) -> Eligibility {
        let (profile, gateway) = tokio::join!(self.current_artist(), self.gateway_configured());
        Eligibility::for_profile(&Signal::from(profile), &gateway)
    }

    // ---- Reads -----------------------------------------------------------

    /// Every published media item.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn all_media(&self) -> Result<Vec<MediaItem>> {
        self.cache
            .read_through(QueryKey::AllMedia, || async {
                self.backend.get()?.list_media().await
            })
            .await
    }

    /// Media published by one artist.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn artist_media(&self, artist: &ArtistId) -> Result<Vec<MediaItem>> {
        self.cache
            .read_through(QueryKey::ArtistMedia(artist.clone()), || async {
                self.backend.get()?.media_by_artist(artist).await
            })
            .await
    }

    /// Media in one category.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn category_media(&self, category: MediaCategory) -> Result<Vec<MediaItem>> {
        self.cache
            .read_through(QueryKey::CategoryMedia(category), || async {
                self.backend.get()?.media_by_category(category).await
            })
            .await
    }

    /// One media item with its artist and donation totals.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn media_card(&self, media_id: &MediaId) -> Result<Option<MediaCard>> {
        self.cache
            .read_through(QueryKey::MediaItem(media_id.clone()), || async {
                self.backend.get()?.media_card(media_id).await
            })
            .await
    }

    /// Every media item with its artist and donation totals.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn media_cards(&self) -> Result<Vec<MediaCard>> {
        self.cache
            .read_through(QueryKey::MediaWithDonationContext, || async {
                self.backend.get()?.media_cards().await
            })
            .await
    }

    /// The caller's artist profile.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn current_artist(&self) -> Result<Option<ArtistProfile>> {
        self.cache
            .read_through(QueryKey::CurrentArtist, || async {
                self.backend.get()?.caller_artist().await
            })
            .await
    }

    /// Another artist's profile.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn artist(&self, artist: &ArtistId) -> Result<Option<ArtistProfile>> {
        self.cache
            .read_through(QueryKey::Artist(artist.clone()), || async {
                self.backend.get()?.artist(artist).await
            })
            .await
    }

    /// Status of a checkout session.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        debug!("Reading status of {session_id}");
        self.cache
            .read_through(QueryKey::SessionStatus(session_id.clone()), || async {
                self.backend.get()?.get_session_status(session_id).await
            })
            .await
    }
}
