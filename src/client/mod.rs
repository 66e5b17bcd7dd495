//! Client facade for busker.
//!
//! [`BuskerClient`] is the boundary between user actions and the rest of the
//! crate. It owns one backend slot and one cache, and hands both to the
//! upload service, checkout manager, eligibility gate and payment resolvers.
//!
//! # Example
//!
//! ```rust,ignore
//! use busker::client::BuskerClient;
//! use busker::backend::MemoryBackend;
//! use busker::media::MediaDraft;
//! use busker::upload::NoopObserver;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> busker::Result<()> {
//!     let backend = MemoryBackend::new();
//!     let client = BuskerClient::with_defaults()
//!         .with_backend(Arc::new(backend.clone()))
//!         .with_identity(backend.caller());
//!
//!     let draft = MediaDraft::from_file("night-set.mp3", std::fs::read("night-set.mp3")?);
//!     let id = client.publish_media(draft, Arc::new(NoopObserver)).await?;
//!
//!     let eligibility = client.eligibility(&backend.caller()).await;
//!     println!("{id}: {eligibility:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Consistency
//!
//! Every mutation invalidates the scopes it declares before returning, so a
//! read issued after the mutation completes never sees data cached before
//! it. Observers subscribed through [`BuskerClient::subscribe`] receive a
//! `CacheInvalidated` event listing the dropped keys.

mod busker;
mod data_types;

pub use busker::BuskerClient;
pub use data_types::{ClientStats, ProfileDraft};
