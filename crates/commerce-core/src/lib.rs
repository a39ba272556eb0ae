//! # commerce-core
//!
//! Domain model and storage seams for the event commerce checkout core.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Reconciliation Engine                        │
//! │  ┌───────────────────┐        ┌───────────────────────────┐  │
//! │  │  InventoryLedger  │        │        SaleStore          │  │
//! │  │  (reserve/release)│        │  (pending → completed/    │  │
//! │  │                   │        │   failed, CAS-guarded)    │  │
//! │  └───────────────────┘        └───────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two traits are the persistence seams: the in-memory
//! implementations here serve development and tests, and any
//! database-backed implementation must keep the same atomicity
//! contracts (`reserve` is a single check-and-increment, sale status
//! transitions are compare-and-swap from `Pending`).

pub mod error;
pub mod ledger;
pub mod model;
pub mod store;

pub use error::{CommerceError, Result};
pub use ledger::{InventoryLedger, MemoryInventoryLedger, Reservation};
pub use model::{
    Buyer, PaymentMethod, ProviderCapture, Sale, SaleId, SaleItem, SaleStatus, Sellable,
    SellableId, to_minor_units,
};
pub use store::{MemorySaleStore, SaleStore};
