//! Checkout sessions with the payment gateway.
//!
//! # Flow
//!
//! ```text
//! cart ──► validate (items, currency, minimum, URLs) ──► backend.create_checkout_session
//!                                                               │
//!                                                        encoded envelope
//!                                                               │
//!                                                   decode {id, url} ──► CheckoutSession
//!                                                               │
//!                                              url missing/empty ──► SessionCreation
//! ```
//!
//! Everything up to the backend call is checked locally; a cart that fails
//! validation never reaches the network.

pub mod amount;
mod redirect;

pub use amount::{display_amount, minor_units, parse_donation_amount, PRESET_AMOUNTS};
pub use redirect::{
    RedirectArrival, RedirectTarget, RedirectUrls, CANCEL_PATH, SESSION_ID_PLACEHOLDER,
    SUCCESS_PATH,
};

use crate::backend::{BackendSlot, MediaId, SessionId, ShoppingItem};
use crate::config::CheckoutConfig;
use crate::error::{Error, Result};
use crate::event::{ClientEvent, ClientEventsSender};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

/// A usable gateway session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Session identifier, when the gateway returned one.
    pub id: Option<SessionId>,
    /// Gateway page the payer is sent to. Never empty.
    pub url: String,
    /// Landing page after payment.
    pub success_url: String,
    /// Landing page after cancellation.
    pub cancel_url: String,
}

/// A listener's donation to one media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationRequest {
    /// Media being supported.
    pub media_id: MediaId,
    /// Media title.
    pub media_title: String,
    /// Artist display name.
    pub artist_name: String,
    /// Amount in minor units.
    pub amount_minor: u64,
    /// Optional note for the artist.
    pub message: Option<String>,
    /// Optional donor name.
    pub donor_name: Option<String>,
}

impl DonationRequest {
    /// A donation of `amount_minor` to `media_id`.
    pub fn new(
        media_id: MediaId,
        media_title: impl Into<String>,
        artist_name: impl Into<String>,
        amount_minor: u64,
    ) -> Self {
        Self {
            media_id,
            media_title: media_title.into(),
            artist_name: artist_name.into(),
            amount_minor,
            message: None,
            donor_name: None,
        }
    }

    /// Attach a note. Blank notes are ignored.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = non_blank(message.into());
        self
    }

    /// Attach the donor's name. Blank names are ignored.
    #[must_use]
    pub fn with_donor(mut self, donor: impl Into<String>) -> Self {
        self.donor_name = non_blank(donor.into());
        self
    }

    /// The single cart line for this donation.
    #[must_use]
    pub fn line_item(&self, currency: &str) -> ShoppingItem {
        let mut description = format!(
            "Donation to {} for \"{}\"",
            self.artist_name, self.media_title
        );
        if let Some(ref message) = self.message {
            description.push_str(" - ");
            description.push_str(message);
        }
        if let Some(ref donor) = self.donor_name {
            description.push_str(" from ");
            description.push_str(donor);
        }
        ShoppingItem {
            product_name: format!("Support: {}", self.media_title),
            product_description: description,
            price_minor: self.amount_minor,
            quantity: 1,
            currency: currency.to_lowercase(),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Creates checkout sessions.
#[derive(Clone)]
pub struct CheckoutSessionManager {
    backend: BackendSlot,
    config: CheckoutConfig,
    events: Option<ClientEventsSender>,
}

impl CheckoutSessionManager {
    /// Create a session manager.
    #[must_use]
    pub fn new(backend: BackendSlot, config: CheckoutConfig) -> Self {
        debug!(
            "Checkout manager created (origin={}, currency={}, minimum={})",
            config.origin, config.currency, config.minimum_minor_units
        );
        Self {
            backend,
            config,
            events: None,
        }
    }

    /// Publish `CheckoutStarted` events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: ClientEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Checkout configuration in use.
    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Check a cart against local rules.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty cart, a non-positive price or
    /// quantity, mixed currencies, or a total below the minimum.
    pub fn validate_items(&self, items: &[ShoppingItem]) -> Result<u64> {
        let first = items
            .first()
            .ok_or_else(|| Error::Validation("cart is empty".into()))?;

        let mut total: u64 = 0;
        for item in items {
            if item.price_minor == 0 {
                return Err(Error::Validation(format!(
                    "{} has no price",
                    item.product_name
                )));
            }
            if item.quantity == 0 {
                return Err(Error::Validation(format!(
                    "{} has no quantity",
                    item.product_name
                )));
            }
            if !item.currency.eq_ignore_ascii_case(&first.currency) {
                return Err(Error::Validation(format!(
                    "cart mixes currencies {} and {}",
                    first.currency, item.currency
                )));
            }
            total = item
                .total_minor()
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| Error::Validation("cart total out of range".into()))?;
        }

        amount::ensure_minimum(total, self.config.minimum_minor_units)?;
        Ok(total)
    }

    /// Create a gateway session for `items`.
    ///
    /// # Errors
    ///
    /// - `Validation` if the cart or URLs fail local checks.
    /// - `BackendUnavailable` if no backend is connected.
    /// - `Backend` if the backend call fails.
    /// - `SessionCreation` if the returned envelope has no usable `url`.
    pub async fn create_session(
        &self,
        items: &[ShoppingItem],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let total = self.validate_items(items)?;
        require_absolute(success_url)?;
        require_absolute(cancel_url)?;
        let backend = self.backend.get()?;

        debug!(
            "Creating checkout session ({} items, total {})",
            items.len(),
            display_amount(total)
        );
        let envelope = backend
            .create_checkout_session(items, success_url, cancel_url)
            .await?;
        let (id, url) = decode_envelope(&envelope)?;

        info!(
            "Checkout session created: {}",
            id.as_ref().map_or("<no id>", SessionId::as_str)
        );
        if let Some(ref events) = self.events {
            let _ = events.send(ClientEvent::CheckoutStarted {
                session_id: id.as_ref().map(ToString::to_string).unwrap_or_default(),
                url: url.clone(),
            });
        }

        Ok(CheckoutSession {
            id,
            url,
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        })
    }

    /// Build the cart and landing URLs for a donation and create its session.
    ///
    /// # Errors
    ///
    /// See [`create_session`](Self::create_session).
    pub async fn start_donation(&self, donation: &DonationRequest) -> Result<CheckoutSession> {
        amount::ensure_minimum(donation.amount_minor, self.config.minimum_minor_units)?;
        let urls = RedirectUrls::for_media(&self.config.origin, &donation.media_id)?;
        let item = donation.line_item(&self.config.currency);
        self.create_session(&[item], &urls.success_url, &urls.cancel_url)
            .await
    }
}

fn require_absolute(url: &str) -> Result<()> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|e| Error::Validation(format!("redirect URL must be absolute ({url}): {e}")))
}

/// Decode the gateway envelope into `(id, url)`.
fn decode_envelope(envelope: &str) -> Result<(Option<SessionId>, String)> {
    let value: Value = serde_json::from_str(envelope).map_err(|e| {
        warn!("Undecodable checkout envelope: {e}");
        Error::SessionCreation(format!("invalid session envelope: {e}"))
    })?;

    let url = match value.get("url") {
        Some(Value::String(url)) if !url.trim().is_empty() => url.clone(),
        _ => {
            warn!("Checkout envelope has no url");
            return Err(Error::SessionCreation("session missing url".into()));
        }
    };
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(SessionId::from);

    Ok((id, url))
}
