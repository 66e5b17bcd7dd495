//! # busker
//!
//! Commerce and donation client for a platform where musicians publish
//! media and listeners support them through a hosted payment gateway.
//!
//! ## Components
//!
//! - **Uploads** ([`upload`]): stream media to storage with monotonic
//!   progress, size limits, integrity checks and cancellation
//! - **Checkout** ([`checkout`]): validate carts, convert amounts and create
//!   gateway sessions
//! - **Payments** ([`payment`]): resolve the payer's return and decide
//!   whether donation UI is shown
//! - **Cache** ([`cache`]): keep read results consistent after mutations
//! - **Client** ([`client`]): the facade that ties them to a backend
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use busker::{BuskerClient, ClientConfig};
//! use busker::backend::HttpBackend;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::from_file(&busker::config::default_config_path())?;
//! let backend = HttpBackend::new(&config.backend, config.upload.chunk_size)?;
//! let client = BuskerClient::new(config).with_backend(Arc::new(backend));
//!
//! let session = client.donate(&"m1".into(), "5.00", None, None).await?;
//! println!("continue at {}", session.url);
//! ```

pub mod backend;
pub mod cache;
pub mod checkout;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod media;
pub mod notice;
pub mod payment;
pub mod upload;

pub use backend::{Backend, BackendSlot, HttpBackend, MemoryBackend};
pub use cache::CacheConsistencyManager;
pub use checkout::CheckoutSessionManager;
pub use client::BuskerClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use event::{ClientEvent, ClientEventsChannel};
pub use notice::Notice;
pub use payment::{EligibilityGate, PaymentOutcomeResolver};
pub use upload::BlobUploadService;
