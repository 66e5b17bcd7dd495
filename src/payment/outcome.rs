//! Resolving the payer's return from the gateway.

use crate::backend::{BackendSlot, MediaId, SessionId, SessionStatus};
use crate::cache::{CacheConsistencyManager, Mutation};
use crate::checkout::{RedirectArrival, RedirectTarget};
use crate::error::{Error, Result};
use crate::event::{ClientEvent, ClientEventsSender};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a checkout, as far as the client knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Not known yet.
    Pending,
    /// The payment went through.
    Completed {
        /// Opaque gateway response.
        response: String,
        /// Identity the gateway resolved for the payer.
        user_identity: Option<String>,
    },
    /// The payment did not go through.
    Failed {
        /// Why.
        reason: String,
    },
}

impl PaymentOutcome {
    /// Whether the outcome is final.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether the payment went through.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl From<SessionStatus> for PaymentOutcome {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Completed {
                response,
                user_principal,
            } => Self::Completed {
                response,
                user_identity: user_principal,
            },
            SessionStatus::Failed { error } => Self::Failed { reason: error },
        }
    }
}

struct ResolverState {
    outcome: PaymentOutcome,
    looked_up: bool,
}

/// Resolves one redirect arrival.
///
/// Create one per landing-page visit. The session is looked up at most once;
/// later calls return the first observed outcome.
pub struct PaymentOutcomeResolver {
    arrival: RedirectArrival,
    backend: BackendSlot,
    cache: CacheConsistencyManager,
    events: Option<ClientEventsSender>,
    state: Mutex<ResolverState>,
}

impl PaymentOutcomeResolver {
    /// A resolver for `arrival`.
    #[must_use]
    pub fn new(
        arrival: RedirectArrival,
        backend: BackendSlot,
        cache: CacheConsistencyManager,
    ) -> Self {
        Self {
            arrival,
            backend,
            cache,
            events: None,
            state: Mutex::new(ResolverState {
                outcome: PaymentOutcome::Pending,
                looked_up: false,
            }),
        }
    }

    /// Publish `PaymentResolved` events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: ClientEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// The arrival being resolved.
    #[must_use]
    pub fn arrival(&self) -> &RedirectArrival {
        &self.arrival
    }

    /// Media the payment was for, if known.
    #[must_use]
    pub fn media_id(&self) -> Option<&MediaId> {
        self.arrival.media_id.as_ref()
    }

    /// Outcome observed so far, without a lookup.
    pub async fn current(&self) -> PaymentOutcome {
        self.state.lock().await.outcome.clone()
    }

    /// Resolve the outcome.
    ///
    /// - An arrival on the cancel page is `Failed` without a lookup.
    /// - Without a session id the outcome stays `Pending` and no lookup runs.
    /// - Otherwise the session status is looked up once. A completed payment
    ///   invalidates the media and donation reads it changed.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if no backend is connected (a later call
    /// may try again), or the lookup error. A failed lookup is not retried;
    /// the outcome stays `Pending`.
    pub async fn resolve(&self) -> Result<PaymentOutcome> {
        let mut state = self.state.lock().await;
        if state.looked_up || state.outcome.is_terminal() {
            return Ok(state.outcome.clone());
        }

        if self.arrival.target == RedirectTarget::Cancel {
            state.outcome = PaymentOutcome::Failed {
                reason: "payment was cancelled".to_string(),
            };
            self.emit(false);
            return Ok(state.outcome.clone());
        }

        let Some(session_id) = self.arrival.session_id.clone() else {
            debug!("No session id on payment redirect; outcome stays pending");
            return Ok(PaymentOutcome::Pending);
        };

        let backend = self.backend.get()?;
        state.looked_up = true;
        let status = self.lookup(&session_id, backend.get_session_status(&session_id).await)?;

        state.outcome = PaymentOutcome::from(status);
        match state.outcome {
            PaymentOutcome::Completed { .. } => {
                info!("Payment {session_id} completed");
                self.cache.invalidate(&Mutation::PaymentCompleted {
                    media_id: self.arrival.media_id.clone(),
                    session_id: session_id.clone(),
                });
                self.emit(true);
            }
            PaymentOutcome::Failed { ref reason } => {
                info!("Payment {session_id} failed: {reason}");
                self.emit(false);
            }
            PaymentOutcome::Pending => {}
        }
        Ok(state.outcome.clone())
    }

    fn lookup(
        &self,
        session_id: &SessionId,
        result: Result<SessionStatus>,
    ) -> Result<SessionStatus> {
        result.map_err(|e| {
            warn!("Status lookup for {session_id} failed: {e}");
            if let Some(ref events) = self.events {
                let _ = events.send(ClientEvent::Error {
                    message: e.to_string(),
                });
            }
            match e {
                Error::Backend(_) => e,
                other => Error::Backend(other.to_string()),
            }
        })
    }

    fn emit(&self, completed: bool) {
        if let Some(ref events) = self.events {
            let _ = events.send(ClientEvent::PaymentResolved {
                media_id: self.arrival.media_id.as_ref().map(ToString::to_string),
                completed,
            });
        }
    }
}
