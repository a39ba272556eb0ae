//! Application State

use std::sync::Arc;

use commerce_core::{MemoryInventoryLedger, MemorySaleStore};
use commerce_engine::ReconciliationEngine;
use commerce_gateways::StripeWebhook;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Catalog + inventory counters
    pub ledger: Arc<MemoryInventoryLedger>,

    /// Sale records
    pub store: Arc<MemorySaleStore>,

    /// The reconciliation engine (purchase + verify entry points)
    pub engine: Arc<ReconciliationEngine>,

    /// Stripe webhook verifier (None if not configured)
    pub stripe_webhook: Option<Arc<StripeWebhook>>,

    /// Which gateways were configured at startup
    pub stripe_configured: bool,
    pub paypal_configured: bool,
}
