//! # commerce-engine
//!
//! Payment reconciliation for the event commerce platform.
//!
//! ## State machine per sale
//!
//! ```text
//!  [no sale] ── create_session ok ──► Pending
//!  Pending ── verify = Paid ────────► Completed  (terminal, idempotent re-entry)
//!  Pending ── verify = Expired ─────► Failed     (terminal; releases the
//!                                                 reservation exactly once)
//!  Pending ── verify = gateway err ─► Pending    (only last_payment_check_at moves)
//! ```
//!
//! Inventory is reserved before the external checkout session is
//! created, so two buyers can never both hold a checkout page for the
//! last unit; the cost is that a failed or abandoned checkout must
//! give its reservation back, which `verify_payment` does on the one
//! call that wins the `Pending -> Failed` compare-and-swap.
//!
//! The engine owns no scheduler. An external periodic job (the server
//! runs one) calls [`ReconciliationEngine::sweep_stale`], which is
//! just `verify_payment` over the stale pending set -- every entry
//! point here is safe to call arbitrarily many times.

pub mod artifact;
pub mod engine;

pub use artifact::{ArtifactGenerator, NoopArtifactGenerator};
pub use engine::{
    EngineConfig, PurchaseItem, PurchaseRequest, PurchaseTicket, ReconciliationEngine,
    SweepReport,
};
