//! End-to-end tests for busker.
//!
//! Every test drives a [`busker::BuskerClient`] against the in-process
//! backend, so the whole action path (validation, upload, backend call,
//! invalidation, events) runs without a network.
//!
//! ## Test Coverage
//!
//! - Media publishing, batch uploads and deletion
//! - Donation checkout and payment resolution
//! - Eligibility across loading and resolved signals
//! - Cache consistency after every mutation

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod harness;

mod consistency_tests;
mod donation_tests;
mod media_tests;

pub use harness::TestHarness;
