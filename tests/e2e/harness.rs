//! Test harness wiring a client to the in-process backend.

use busker::backend::{ArtistId, GatewayConfiguration, MediaId, MemoryBackend, SessionId};
use busker::client::{BuskerClient, ProfileDraft};
use busker::config::ClientConfig;
use busker::media::{MediaCategory, MediaDraft};
use busker::upload::NoopObserver;
use std::sync::Arc;

/// Origin used for checkout redirects in tests.
pub const ORIGIN: &str = "https://busk.example";

/// A client and the backend behind it.
pub struct TestHarness {
    /// Backend, for scripting and inspection.
    pub backend: MemoryBackend,
    /// Client under test.
    pub client: BuskerClient,
}

impl TestHarness {
    /// A client acting as the backend's default caller.
    #[must_use]
    pub fn setup() -> Self {
        let backend = MemoryBackend::new();
        let mut config = ClientConfig::default();
        config.checkout.origin = ORIGIN.to_string();
        let client = BuskerClient::new(config)
            .with_backend(Arc::new(backend.clone()))
            .with_identity(backend.caller());
        Self { backend, client }
    }

    /// A harness whose caller is an artist ready to take donations on a
    /// configured platform.
    pub async fn setup_donations() -> Self {
        let harness = Self::setup();
        harness.configure_gateway().await;
        harness.onboard("Ada", true).await;
        harness
            .client
            .attach_credential("acct_test")
            .await
            .expect("attach credential");
        harness
    }

    /// The caller's artist id.
    #[must_use]
    pub fn artist(&self) -> ArtistId {
        self.backend.caller()
    }

    /// Configure the platform gateway.
    pub async fn configure_gateway(&self) {
        self.client
            .configure_gateway(&GatewayConfiguration {
                allowed_countries: vec!["US".into(), "CA".into()],
                secret_key: "sk_test_e2e".into(),
            })
            .await
            .expect("configure gateway");
    }

    /// Onboard the caller.
    pub async fn onboard(&self, name: &str, donations: bool) {
        self.client
            .onboard_artist(ProfileDraft::named(name).with_donations(donations))
            .await
            .expect("onboard artist");
    }

    /// Publish a small recording.
    pub async fn publish(&self, title: &str) -> MediaId {
        let draft = MediaDraft::from_file(&format!("{title}.mp3"), vec![7u8; 2048])
            .with_category(MediaCategory::Recording);
        self.client
            .publish_media(draft, Arc::new(NoopObserver))
            .await
            .expect("publish media")
    }

    /// The newest checkout session.
    #[must_use]
    pub fn latest_session(&self) -> SessionId {
        self.backend
            .session_ids()
            .into_iter()
            .max_by_key(|id| {
                id.as_str()
                    .trim_start_matches("cs_")
                    .parse::<u64>()
                    .unwrap_or(0)
            })
            .expect("a session exists")
    }

    /// Landing URL the gateway would send a paying donor to.
    #[must_use]
    pub fn success_landing(media_id: &MediaId, session_id: &SessionId) -> String {
        format!("{ORIGIN}/payment-success?mediaId={media_id}&session_id={session_id}")
    }
}
