//! Client event system.

use crate::cache::QueryKey;
use tokio::sync::broadcast;

/// Events emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// An upload reported progress.
    UploadProgress {
        /// Upload task identifier.
        task_id: u64,
        /// Percentage in 0..=100.
        percent: u8,
    },

    /// An upload reached a terminal state.
    UploadFinished {
        /// Upload task identifier.
        task_id: u64,
        /// Whether storage acknowledged the blob.
        succeeded: bool,
    },

    /// A media item was published.
    MediaPublished {
        /// New media identifier.
        media_id: String,
    },

    /// A media item was deleted.
    MediaDeleted {
        /// Deleted media identifier.
        media_id: String,
    },

    /// A checkout session was created and the payer should be redirected.
    CheckoutStarted {
        /// Session identifier.
        session_id: String,
        /// Gateway redirect URL.
        url: String,
    },

    /// A payment redirect was resolved.
    PaymentResolved {
        /// Media the payment was made for, if known.
        media_id: Option<String>,
        /// Whether the payment completed.
        completed: bool,
    },

    /// Cached reads were dropped and should be re-fetched.
    CacheInvalidated {
        /// Keys that were evicted.
        keys: Vec<QueryKey>,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving client events.
pub type ClientEventsChannel = broadcast::Receiver<ClientEvent>;

/// Sender for client events.
pub type ClientEventsSender = broadcast::Sender<ClientEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (ClientEventsSender, ClientEventsChannel) {
    broadcast::channel(256)
}
