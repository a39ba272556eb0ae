//! Sale Record Store
//!
//! The single source of truth for order state. Status transitions out
//! of `Pending` are compare-and-swap guarded so that concurrent
//! verification attempts (poll and webhook firing near-simultaneously)
//! settle a sale exactly once.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::{CommerceError, Result};
use crate::model::{ProviderCapture, Sale, SaleId, SaleStatus};

/// Sale storage trait.
///
/// `mark_completed` and `mark_failed` return `true` only for the call
/// that actually performed the transition; callers use that return to
/// run side effects (artifact generation, inventory release) exactly
/// once.
pub trait SaleStore: Send + Sync {
    /// Persist a new pending sale
    fn create_pending(&self, sale: &Sale) -> Result<()>;

    /// Get a sale by id
    fn get(&self, id: &SaleId) -> Result<Option<Sale>>;

    /// Resolve a sale from a provider session/order identifier
    /// (return URL or webhook metadata)
    fn get_by_provider_session(&self, session_id: &str) -> Result<Option<Sale>>;

    /// Record the external checkout/order identifier once the gateway
    /// confirms creation
    fn attach_provider_session(&self, id: &SaleId, session_id: &str) -> Result<()>;

    /// Transition `Pending -> Completed`, setting `purchased_at` and
    /// the capture fields.
    ///
    /// Idempotent: returns `Ok(false)` without touching anything when
    /// the sale is already settled.
    fn mark_completed(&self, id: &SaleId, capture: &ProviderCapture) -> Result<bool>;

    /// Transition `Pending -> Failed`.
    ///
    /// Only valid from `Pending`; any other state is a no-op returning
    /// `Ok(false)`, which is what prevents double-release of inventory.
    fn mark_failed(&self, id: &SaleId) -> Result<bool>;

    /// Update `last_payment_check_at`, used to throttle re-checks
    fn touch_last_checked(&self, id: &SaleId) -> Result<()>;

    /// Pending sales whose last check (or creation, if never checked)
    /// predates `cutoff` -- the stale set the reconciliation sweep
    /// re-verifies.
    fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Sale>>;
}

/// In-memory sale store (for development and tests)
pub struct MemorySaleStore {
    sales: RwLock<HashMap<SaleId, Sale>>,
    by_session: RwLock<HashMap<String, SaleId>>,
}

impl Default for MemorySaleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySaleStore {
    pub fn new() -> Self {
        Self {
            sales: RwLock::new(HashMap::new()),
            by_session: RwLock::new(HashMap::new()),
        }
    }
}

impl SaleStore for MemorySaleStore {
    fn create_pending(&self, sale: &Sale) -> Result<()> {
        if sale.status != SaleStatus::Pending {
            return Err(CommerceError::Storage(format!(
                "sale {} created with status {}",
                sale.id,
                sale.status.as_str()
            )));
        }

        let mut sales = self.sales.write().unwrap();
        if sales.contains_key(&sale.id) {
            return Err(CommerceError::Storage(format!(
                "sale {} already exists",
                sale.id
            )));
        }
        sales.insert(sale.id, sale.clone());
        Ok(())
    }

    fn get(&self, id: &SaleId) -> Result<Option<Sale>> {
        let sales = self.sales.read().unwrap();
        Ok(sales.get(id).cloned())
    }

    fn get_by_provider_session(&self, session_id: &str) -> Result<Option<Sale>> {
        let by_session = self.by_session.read().unwrap();
        let sales = self.sales.read().unwrap();

        if let Some(id) = by_session.get(session_id) {
            Ok(sales.get(id).cloned())
        } else {
            Ok(None)
        }
    }

    fn attach_provider_session(&self, id: &SaleId, session_id: &str) -> Result<()> {
        let mut sales = self.sales.write().unwrap();
        let mut by_session = self.by_session.write().unwrap();

        let sale = sales
            .get_mut(id)
            .ok_or_else(|| CommerceError::SaleNotFound(id.to_string()))?;

        sale.provider_session_id = Some(session_id.to_string());
        by_session.insert(session_id.to_string(), *id);
        Ok(())
    }

    fn mark_completed(&self, id: &SaleId, capture: &ProviderCapture) -> Result<bool> {
        let mut sales = self.sales.write().unwrap();
        let sale = sales
            .get_mut(id)
            .ok_or_else(|| CommerceError::SaleNotFound(id.to_string()))?;

        match sale.status {
            SaleStatus::Pending => {
                sale.status = SaleStatus::Completed;
                sale.purchased_at = Some(Utc::now());
                sale.provider_payment_id = capture.payment_id.clone();
                sale.provider_payer_id = capture.payer_id.clone();
                Ok(true)
            }
            SaleStatus::Completed => Ok(false),
            SaleStatus::Failed | SaleStatus::Refunded => {
                // A paid signal for a settled-failed sale needs a human:
                // the money moved but the sale already gave its unit back.
                tracing::warn!(
                    sale_id = %id,
                    status = sale.status.as_str(),
                    "Ignoring paid signal for a sale that is no longer pending"
                );
                Ok(false)
            }
        }
    }

    fn mark_failed(&self, id: &SaleId) -> Result<bool> {
        let mut sales = self.sales.write().unwrap();
        let sale = sales
            .get_mut(id)
            .ok_or_else(|| CommerceError::SaleNotFound(id.to_string()))?;

        if sale.status == SaleStatus::Pending {
            sale.status = SaleStatus::Failed;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn touch_last_checked(&self, id: &SaleId) -> Result<()> {
        let mut sales = self.sales.write().unwrap();
        let sale = sales
            .get_mut(id)
            .ok_or_else(|| CommerceError::SaleNotFound(id.to_string()))?;

        sale.last_payment_check_at = Some(Utc::now());
        Ok(())
    }

    fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Sale>> {
        let sales = self.sales.read().unwrap();
        Ok(sales
            .values()
            .filter(|sale| {
                sale.status == SaleStatus::Pending
                    && sale.last_payment_check_at.unwrap_or(sale.created_at) < cutoff
            })
            .cloned()
            .collect())
    }
}
