//! Donation eligibility and payment outcomes.
//!
//! Two read-side concerns around a checkout:
//! 1. Before: should donation UI be offered at all ([`EligibilityGate`])
//! 2. After: did the payment go through ([`PaymentOutcomeResolver`])
//!
//! # Architecture
//!
//! ```text
//! payer lands on /payment-success or /payment-failure
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ RedirectArrival     │
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!  CANCEL       SUCCESS
//!    │             │
//!    ▼             ▼
//!  Failed     session id?
//!                  │
//!           ┌──────┴──────┐
//!           │             │
//!          NO            YES
//!           │             │
//!           ▼             ▼
//!        Pending    one status lookup
//!                         │
//!                  ┌──────┴──────┐
//!                  │             │
//!              COMPLETED      FAILED
//!                  │             │
//!                  ▼             ▼
//!         invalidate media    no change
//!         + donation reads
//! ```

mod eligibility;
mod outcome;

pub use eligibility::{Eligibility, EligibilityGate, Signal};
pub use outcome::{PaymentOutcome, PaymentOutcomeResolver};
