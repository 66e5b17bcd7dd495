//! In-process backend.
//!
//! Keeps blobs, media, profiles and checkout sessions in memory. Used by the
//! test suite and by the CLI's offline mode. A few knobs let callers script
//! gateway and storage misbehaviour (out-of-order progress, failed uploads,
//! malformed session envelopes).

use super::data_types::{
    ArtistId, ArtistProfile, BlobReference, GatewayConfiguration, MediaCard, MediaId, MediaItem,
    MediaItemInput, SessionId, SessionStatus, ShoppingItem,
};
use super::{Backend, ProgressFn};
use crate::error::{Error, Result, TransferErrorKind};
use crate::media::MediaCategory;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Identity used for "caller" operations unless overridden.
pub const DEFAULT_CALLER: &str = "artist-local";

#[derive(Default)]
struct ArtistRecord {
    profile: ArtistProfile,
    credential: Option<String>,
}

struct SessionRecord {
    items: Vec<ShoppingItem>,
    media_id: Option<MediaId>,
    status: Option<SessionStatus>,
}

#[derive(Default)]
struct State {
    blobs: HashMap<String, Bytes>,
    media: Vec<MediaItem>,
    artists: HashMap<ArtistId, ArtistRecord>,
    gateway: Option<GatewayConfiguration>,
    sessions: HashMap<SessionId, SessionRecord>,
    donations: HashMap<MediaId, u64>,
    next_id: u64,
    // Scripted behaviour
    progress_script: Option<Vec<u8>>,
    fail_next_upload: Option<TransferErrorKind>,
    corrupt_next_ack: bool,
    envelope_override: Option<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

/// Backend that keeps all state in process.
#[derive(Clone)]
pub struct MemoryBackend {
    caller: Arc<Mutex<ArtistId>>,
    state: Arc<Mutex<State>>,
    calls: Arc<AtomicU64>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend whose caller is [`DEFAULT_CALLER`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            caller: Arc::new(Mutex::new(ArtistId::from(DEFAULT_CALLER))),
            state: Arc::new(Mutex::new(State::default())),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Act as a different caller from now on.
    pub fn set_caller(&self, caller: ArtistId) {
        *self.caller.lock() = caller;
    }

    /// The current caller identity.
    #[must_use]
    pub fn caller(&self) -> ArtistId {
        self.caller.lock().clone()
    }

    /// Number of backend operations invoked so far.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw bytes stored under a blob key.
    #[must_use]
    pub fn blob_bytes(&self, key: &str) -> Option<Bytes> {
        self.state.lock().blobs.get(key).cloned()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.state.lock().blobs.len()
    }

    /// Report this exact progress sequence on the next upload.
    pub fn script_progress(&self, sequence: Vec<u8>) {
        self.state.lock().progress_script = Some(sequence);
    }

    /// Fail the next upload (bytes or URL) with the given kind.
    pub fn fail_next_upload(&self, kind: TransferErrorKind) {
        self.state.lock().fail_next_upload = Some(kind);
    }

    /// Acknowledge the next upload with a wrong digest.
    pub fn corrupt_next_ack(&self) {
        self.state.lock().corrupt_next_ack = true;
    }

    /// Return this envelope from the next checkout session request.
    pub fn override_next_envelope(&self, envelope: impl Into<String>) {
        self.state.lock().envelope_override = Some(envelope.into());
    }

    /// Mark a session as paid and credit its media item.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown.
    pub fn complete_session(&self, session_id: &SessionId) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::Backend(format!("unknown session {session_id}")))?;
        let total: u64 = record.items.iter().filter_map(ShoppingItem::total_minor).sum();
        record.status = Some(SessionStatus::Completed {
            response: format!(r#"{{"id":"{session_id}","amount_total":{total}}}"#),
            user_principal: None,
        });
        if let Some(media_id) = record.media_id.clone() {
            *state.donations.entry(media_id).or_default() += total;
        }
        Ok(())
    }

    /// Mark a session as failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown.
    pub fn fail_session(&self, session_id: &SessionId, reason: &str) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::Backend(format!("unknown session {session_id}")))?;
        record.status = Some(SessionStatus::Failed {
            error: reason.to_string(),
        });
        Ok(())
    }

    /// Identifiers of all sessions created so far.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.state.lock().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Seed an artist profile and optional credential directly.
    pub fn insert_artist(&self, id: ArtistId, profile: ArtistProfile, credential: Option<&str>) {
        self.state.lock().artists.insert(
            id,
            ArtistRecord {
                profile,
                credential: credential.map(str::to_string),
            },
        );
    }

    fn record_call(&self, op: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!("memory backend: {op}");
    }

    fn profile_view(record: &ArtistRecord) -> ArtistProfile {
        ArtistProfile {
            has_gateway_credential: record.credential.is_some(),
            ..record.profile.clone()
        }
    }

    fn media_id_from_url(url: &str) -> Option<MediaId> {
        let parsed = reqwest::Url::parse(url).ok()?;
        parsed
            .query_pairs()
            .find(|(k, _)| k == "mediaId")
            .map(|(_, v)| MediaId::from(v.into_owned()))
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn default_progress(len: usize) -> Vec<u8> {
    // One step per quarter of the payload.
    let steps: u8 = if len == 0 { 1 } else { 4 };
    (1..=steps).map(|i| i * (100 / steps)).collect()
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn store_blob_bytes(&self, bytes: Bytes, progress: ProgressFn) -> Result<BlobReference> {
        self.record_call("store_blob_bytes");

        let (script, failure, corrupt) = {
            let mut state = self.state.lock();
            (
                state.progress_script.take(),
                state.fail_next_upload.take(),
                std::mem::take(&mut state.corrupt_next_ack),
            )
        };

        let sequence = script.unwrap_or_else(|| default_progress(bytes.len()));
        let halfway = sequence.len() / 2;
        for (i, pct) in sequence.into_iter().enumerate() {
            if i == halfway {
                if let Some(kind) = failure {
                    return Err(Error::transfer(kind, "storage refused the blob"));
                }
            }
            progress(pct);
            tokio::task::yield_now().await;
        }
        if let Some(kind) = failure {
            return Err(Error::transfer(kind, "storage refused the blob"));
        }

        let mut state = self.state.lock();
        let key = state.next_id("blob-");
        let sha256 = if corrupt {
            digest_hex(b"corrupted")
        } else {
            digest_hex(&bytes)
        };
        let reference = BlobReference {
            url: format!("memory://blobs/{key}"),
            key: key.clone(),
            size: bytes.len() as u64,
            sha256,
        };
        state.blobs.insert(key, bytes);
        Ok(reference)
    }

    async fn store_blob_from_url(&self, url: &str) -> Result<BlobReference> {
        self.record_call("store_blob_from_url");
        let mut state = self.state.lock();
        if let Some(kind) = state.fail_next_upload.take() {
            return Err(Error::transfer(kind, "storage could not fetch the URL"));
        }
        // Remote content is not fetched; the key is recorded so the reference
        // can be published.
        let key = state.next_id("blob-");
        state.blobs.insert(key.clone(), Bytes::new());
        Ok(BlobReference {
            key,
            url: url.to_string(),
            size: 0,
            sha256: String::new(),
        })
    }

    async fn create_checkout_session(
        &self,
        items: &[ShoppingItem],
        success_url: &str,
        _cancel_url: &str,
    ) -> Result<String> {
        self.record_call("create_checkout_session");
        let mut state = self.state.lock();
        if state.gateway.is_none() {
            return Err(Error::Backend("payment gateway is not configured".into()));
        }
        if items.is_empty() {
            return Err(Error::Backend("cart is empty".into()));
        }

        let id = SessionId::new(state.next_id("cs_"));
        state.sessions.insert(
            id.clone(),
            SessionRecord {
                items: items.to_vec(),
                media_id: Self::media_id_from_url(success_url),
                status: None,
            },
        );

        if let Some(envelope) = state.envelope_override.take() {
            return Ok(envelope);
        }
        let envelope = serde_json::json!({
            "id": id.as_str(),
            "url": format!("https://checkout.memory.invalid/pay/{id}"),
        });
        Ok(envelope.to_string())
    }

    async fn get_session_status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        self.record_call("get_session_status");
        let state = self.state.lock();
        let record = state
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::Backend(format!("unknown session {session_id}")))?;
        Ok(record.status.clone().unwrap_or_else(|| SessionStatus::Failed {
            error: "payment not completed".to_string(),
        }))
    }

    async fn is_donations_enabled(&self, artist: &ArtistId) -> Result<bool> {
        self.record_call("is_donations_enabled");
        let state = self.state.lock();
        Ok(state
            .artists
            .get(artist)
            .is_some_and(|r| r.profile.donations_enabled && r.credential.is_some()))
    }

    async fn is_gateway_configured(&self) -> Result<bool> {
        self.record_call("is_gateway_configured");
        Ok(self.state.lock().gateway.is_some())
    }

    async fn set_gateway_configuration(&self, config: &GatewayConfiguration) -> Result<()> {
        self.record_call("set_gateway_configuration");
        self.state.lock().gateway = Some(config.clone());
        Ok(())
    }

    async fn attach_payment_credential(&self, token: &str) -> Result<()> {
        self.record_call("attach_payment_credential");
        let caller = self.caller();
        let mut state = self.state.lock();
        let record = state
            .artists
            .get_mut(&caller)
            .ok_or_else(|| Error::Backend("caller is not an artist".into()))?;
        record.credential = Some(token.to_string());
        record.profile.donations_enabled = true;
        Ok(())
    }

    async fn detach_payment_credential(&self) -> Result<()> {
        self.record_call("detach_payment_credential");
        let caller = self.caller();
        let mut state = self.state.lock();
        let record = state
            .artists
            .get_mut(&caller)
            .ok_or_else(|| Error::Backend("caller is not an artist".into()))?;
        record.credential = None;
        record.profile.donations_enabled = false;
        Ok(())
    }

    async fn publish_media(&self, input: &MediaItemInput) -> Result<MediaId> {
        self.record_call("publish_media");
        let caller = self.caller();
        if input.artist_id != caller {
            return Err(Error::Backend("cannot publish for another artist".into()));
        }
        let mut state = self.state.lock();
        if !state.blobs.contains_key(&input.file.key) {
            return Err(Error::Backend(format!("unknown blob {}", input.file.key)));
        }
        let id = MediaId::new(state.next_id("m"));
        state.media.push(MediaItem {
            id: id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            category: input.category,
            tags: input.tags.clone(),
            artist_id: input.artist_id.clone(),
            file: input.file.clone(),
            created: input.created,
        });
        Ok(id)
    }

    async fn delete_media(&self, media_id: &MediaId) -> Result<()> {
        self.record_call("delete_media");
        let caller = self.caller();
        let mut state = self.state.lock();
        let position = state
            .media
            .iter()
            .position(|m| &m.id == media_id)
            .ok_or_else(|| Error::Backend(format!("media {media_id} not found")))?;
        if state.media[position].artist_id != caller {
            return Err(Error::Backend("cannot delete another artist's media".into()));
        }
        state.media.remove(position);
        Ok(())
    }

    async fn list_media(&self) -> Result<Vec<MediaItem>> {
        self.record_call("list_media");
        Ok(self.state.lock().media.clone())
    }

    async fn media_by_artist(&self, artist: &ArtistId) -> Result<Vec<MediaItem>> {
        self.record_call("media_by_artist");
        let state = self.state.lock();
        Ok(state
            .media
            .iter()
            .filter(|m| &m.artist_id == artist)
            .cloned()
            .collect())
    }

    async fn media_by_category(&self, category: MediaCategory) -> Result<Vec<MediaItem>> {
        self.record_call("media_by_category");
        let state = self.state.lock();
        Ok(state
            .media
            .iter()
            .filter(|m| m.category == category)
            .cloned()
            .collect())
    }

    async fn media_card(&self, media_id: &MediaId) -> Result<Option<MediaCard>> {
        self.record_call("media_card");
        let state = self.state.lock();
        let Some(media) = state.media.iter().find(|m| &m.id == media_id) else {
            return Ok(None);
        };
        Ok(Some(card_for(&state, media)))
    }

    async fn media_cards(&self) -> Result<Vec<MediaCard>> {
        self.record_call("media_cards");
        let state = self.state.lock();
        Ok(state.media.iter().map(|m| card_for(&state, m)).collect())
    }

    async fn caller_artist(&self) -> Result<Option<ArtistProfile>> {
        self.record_call("caller_artist");
        let caller = self.caller();
        Ok(self.state.lock().artists.get(&caller).map(Self::profile_view))
    }

    async fn artist(&self, artist: &ArtistId) -> Result<Option<ArtistProfile>> {
        self.record_call("artist");
        Ok(self.state.lock().artists.get(artist).map(Self::profile_view))
    }

    async fn onboard_artist(&self, profile: &ArtistProfile) -> Result<()> {
        self.record_call("onboard_artist");
        let caller = self.caller();
        let mut state = self.state.lock();
        if state.artists.contains_key(&caller) {
            return Err(Error::Backend("artist already onboarded".into()));
        }
        state.artists.insert(
            caller,
            ArtistRecord {
                profile: profile.clone(),
                credential: None,
            },
        );
        Ok(())
    }

    async fn update_artist(&self, profile: &ArtistProfile) -> Result<()> {
        self.record_call("update_artist");
        let caller = self.caller();
        let mut state = self.state.lock();
        let record = state
            .artists
            .get_mut(&caller)
            .ok_or_else(|| Error::Backend("caller is not an artist".into()))?;
        record.profile = ArtistProfile {
            has_gateway_credential: false,
            ..profile.clone()
        };
        Ok(())
    }
}

fn card_for(state: &State, media: &MediaItem) -> MediaCard {
    let artist = state
        .artists
        .get(&media.artist_id)
        .map(MemoryBackend::profile_view)
        .unwrap_or_default();
    let media_donations = state.donations.get(&media.id).copied().unwrap_or(0);
    let artist_donations = state
        .media
        .iter()
        .filter(|m| m.artist_id == media.artist_id)
        .filter_map(|m| state.donations.get(&m.id))
        .sum();
    MediaCard {
        media: media.clone(),
        artist,
        media_donations,
        artist_donations,
    }
}
