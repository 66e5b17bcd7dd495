//! Donation eligibility from independently loaded signals.

use crate::backend::{ArtistId, ArtistProfile, BackendSlot};
use crate::cache::{CacheConsistencyManager, QueryKey};
use crate::error::Result;
use tracing::{debug, warn};

/// A value that is loaded asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal<T> {
    /// No value yet.
    Loading,
    /// Loaded value.
    Ready(T),
    /// A loaded value that is being re-fetched.
    Refreshing(T),
}

impl<T> Signal<T> {
    /// Whether a value is known. `Refreshing` counts as resolved.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    /// The known value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Loading => None,
            Self::Ready(value) | Self::Refreshing(value) => Some(value),
        }
    }

    /// Mark a re-fetch as started, keeping the known value.
    #[must_use]
    pub fn refresh(self) -> Self {
        match self {
            Self::Ready(value) => Self::Refreshing(value),
            other => other,
        }
    }

    /// Apply a fetch result.
    ///
    /// A failed fetch keeps the last known value; with none it stays
    /// `Loading`.
    #[must_use]
    pub fn settle(self, result: Result<T>) -> Self {
        match (result, self) {
            (Ok(value), _) => Self::Ready(value),
            (Err(_), Self::Ready(value) | Self::Refreshing(value)) => Self::Ready(value),
            (Err(_), Self::Loading) => Self::Loading,
        }
    }
}

impl<T> From<Result<T>> for Signal<T> {
    fn from(result: Result<T>) -> Self {
        Self::Loading.settle(result)
    }
}

/// Whether donation UI should be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// At least one input is still loading. Render no donation UI.
    Pending,
    /// Donations can be made.
    Available,
    /// The artist accepts donations but the platform gateway is not set up.
    ComingSoon,
    /// The artist does not accept donations.
    Unavailable,
}

impl Eligibility {
    /// Combine the two signals.
    ///
    /// Available only when both are resolved and true.
    #[must_use]
    pub fn evaluate(donations_enabled: &Signal<bool>, gateway_configured: &Signal<bool>) -> Self {
        match (donations_enabled.value(), gateway_configured.value()) {
            (None, _) | (_, None) => Self::Pending,
            (Some(true), Some(true)) => Self::Available,
            (Some(true), Some(false)) => Self::ComingSoon,
            (Some(false), Some(_)) => Self::Unavailable,
        }
    }

    /// Eligibility for an artist looking at their own profile.
    ///
    /// The profile carries the opt-in flag and whether a credential is
    /// attached; both must hold.
    #[must_use]
    pub fn for_profile(profile: &Signal<Option<ArtistProfile>>, gateway: &Signal<bool>) -> Self {
        let enabled = match profile {
            Signal::Loading => Signal::Loading,
            Signal::Ready(p) | Signal::Refreshing(p) => Signal::Ready(
                p.as_ref()
                    .is_some_and(|p| p.donations_enabled && p.has_gateway_credential),
            ),
        };
        Self::evaluate(&enabled, gateway)
    }

    /// Whether a donation can be started.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }

    /// Whether an input is still loading.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Text shown in place of the donate button, if any.
    #[must_use]
    pub const fn notice_text(self) -> Option<&'static str> {
        match self {
            Self::Pending | Self::Available => None,
            Self::ComingSoon => Some("Donations coming soon"),
            Self::Unavailable => Some("Donations not available"),
        }
    }
}

/// Loads the eligibility signals and evaluates them.
#[derive(Clone)]
pub struct EligibilityGate {
    backend: BackendSlot,
    cache: CacheConsistencyManager,
}

impl EligibilityGate {
    /// Create a gate reading through `cache`.
    #[must_use]
    pub fn new(backend: BackendSlot, cache: CacheConsistencyManager) -> Self {
        Self { backend, cache }
    }

    /// Whether `artist` accepts donations.
    ///
    /// Yields `Loading` while no backend is connected or the fetch failed.
    pub async fn donations_enabled(&self, artist: &ArtistId) -> Signal<bool> {
        let result = self
            .cache
            .read_through(QueryKey::DonationsEnabled(artist.clone()), || async {
                self.backend.get()?.is_donations_enabled(artist).await
            })
            .await;
        Self::log_failure("donations-enabled", &result);
        result.into()
    }

    /// Whether the platform gateway is configured.
    pub async fn gateway_configured(&self) -> Signal<bool> {
        let result = self
            .cache
            .read_through(QueryKey::GatewayConfigured, || async {
                self.backend.get()?.is_gateway_configured().await
            })
            .await;
        Self::log_failure("gateway-configured", &result);
        result.into()
    }

    /// Load both signals concurrently and evaluate them.
    pub async fn check(&self, artist: &ArtistId) -> Eligibility {
        let (enabled, gateway) =
            tokio::join!(self.donations_enabled(artist), self.gateway_configured());
        let eligibility = Eligibility::evaluate(&enabled, &gateway);
        debug!("Eligibility for {artist}: {eligibility:?}");
        eligibility
    }

    fn log_failure(signal: &str, result: &Result<bool>) {
        if let Err(e) = result {
            warn!("Failed to load {signal} signal: {e}");
        }
    }
}
