//! Payment Reconciliation Engine
//!
//! Orchestrates the checkout flow: reserve inventory, persist a
//! pending sale, open the provider checkout session, and later settle
//! the sale from verified provider state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use commerce_core::error::{CommerceError, Result};
use commerce_core::ledger::{InventoryLedger, Reservation};
use commerce_core::model::{Buyer, PaymentMethod, Sale, SaleId, SaleItem, SaleStatus, SellableId};
use commerce_core::store::SaleStore;
use commerce_gateways::{CheckoutGateway, PaymentOutcome, SessionRequest};

use crate::artifact::{ArtifactGenerator, NoopArtifactGenerator};

/// Engine configuration: where providers send the buyer afterwards
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Success/return URL base; the sale id is appended as a query
    /// parameter so the web layer can resolve the sale
    pub success_url: String,

    /// Cancel URL base, same sale id treatment
    pub cancel_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            success_url: "http://localhost:3000/api/checkout/return".into(),
            cancel_url: "http://localhost:3000/api/checkout/cancelled".into(),
        }
    }
}

impl EngineConfig {
    /// Create from environment variables (`CHECKOUT_SUCCESS_URL`,
    /// `CHECKOUT_CANCEL_URL`), falling back to localhost defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or(defaults.success_url),
            cancel_url: std::env::var("CHECKOUT_CANCEL_URL").unwrap_or(defaults.cancel_url),
        }
    }
}

/// What a purchase request is buying
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PurchaseItem {
    /// An inventory-backed catalog sellable
    Catalog(SellableId),

    /// A directly priced item with no inventory (sponsorships)
    Direct { name: String, unit_price: Decimal },
}

/// A purchase attempt entering the engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub buyer: Buyer,
    pub item: PurchaseItem,
    pub quantity: u32,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Result of a successful purchase initiation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseTicket {
    /// The pending sale (inventory already reserved)
    pub sale: Sale,

    /// Where to redirect the buyer
    pub checkout_url: String,
}

/// Outcome counts from one reconciliation sweep
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
}

/// The reconciliation engine
pub struct ReconciliationEngine {
    store: Arc<dyn SaleStore>,
    ledger: Arc<dyn InventoryLedger>,
    stripe: Option<Arc<dyn CheckoutGateway>>,
    paypal: Option<Arc<dyn CheckoutGateway>>,
    artifacts: Arc<dyn ArtifactGenerator>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn SaleStore>,
        ledger: Arc<dyn InventoryLedger>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            stripe: None,
            paypal: None,
            artifacts: Arc::new(NoopArtifactGenerator),
            config,
        }
    }

    pub fn with_stripe(mut self, gateway: Arc<dyn CheckoutGateway>) -> Self {
        self.stripe = Some(gateway);
        self
    }

    pub fn with_paypal(mut self, gateway: Arc<dyn CheckoutGateway>) -> Self {
        self.paypal = Some(gateway);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactGenerator>) -> Self {
        self.artifacts = artifacts;
        self
    }

    fn gateway_for(&self, method: PaymentMethod) -> Result<&Arc<dyn CheckoutGateway>> {
        let gateway = match method {
            PaymentMethod::Stripe => self.stripe.as_ref(),
            PaymentMethod::Paypal => self.paypal.as_ref(),
        };
        gateway.ok_or_else(|| {
            CommerceError::Config(format!("{} gateway not configured", method.as_str()))
        })
    }

    /// Start a purchase: reserve inventory, persist a pending sale,
    /// open the provider checkout session.
    ///
    /// The reservation and the pending sale form one logical
    /// transaction: any failure after the reservation compensates by
    /// releasing it before the error reaches the caller. A gateway
    /// failure after the sale exists additionally marks the sale
    /// failed, since no external session will ever settle it.
    pub async fn initiate_purchase(&self, request: PurchaseRequest) -> Result<PurchaseTicket> {
        let gateway = self.gateway_for(request.payment_method)?;

        // Resolve the item before touching any state
        let item = match &request.item {
            PurchaseItem::Catalog(id) => {
                let sellable = self
                    .ledger
                    .get(id)?
                    .ok_or_else(|| CommerceError::SellableNotFound(id.to_string()))?;
                SaleItem {
                    sellable_id: Some(*id),
                    name: sellable.name,
                    description: sellable.description,
                    unit_price: sellable.price,
                }
            }
            PurchaseItem::Direct { name, unit_price } => SaleItem {
                sellable_id: None,
                name: name.clone(),
                description: None,
                unit_price: *unit_price,
            },
        };

        // Validates quantity/price; nothing reserved yet on failure
        let mut sale = Sale::new(request.buyer, item, request.quantity, request.payment_method)?;
        sale.event_id = request.event_id;

        let reservation = match sale.sellable_id {
            Some(id) => Some(self.ledger.reserve(&id, sale.quantity)?),
            None => None,
        };

        if let Err(e) = self.store.create_pending(&sale) {
            self.give_back(reservation.as_ref());
            return Err(e);
        }

        let session_request = SessionRequest {
            sale_id: sale.id,
            item_name: sale.item_name.clone(),
            item_description: sale.item_description.clone(),
            unit_price: sale.unit_price,
            quantity: sale.quantity,
            customer_email: sale.buyer.email.clone(),
            success_url: with_sale_id(&self.config.success_url, &sale.id),
            cancel_url: with_sale_id(&self.config.cancel_url, &sale.id),
        };

        let handle = match gateway.create_session(&session_request).await {
            Ok(handle) => handle,
            Err(e) => {
                // Compensating transaction: the reservation was
                // committed before the external call, and no session
                // exists that could later expire.
                if self.store.mark_failed(&sale.id).unwrap_or_else(|e| {
                    tracing::error!(sale_id = %sale.id, error = %e, "Failed to fail sale");
                    false
                }) {
                    self.give_back(reservation.as_ref());
                }
                return Err(CommerceError::PaymentCreationFailed(e.to_string()));
            }
        };

        if let Err(e) = self
            .store
            .attach_provider_session(&sale.id, &handle.provider_session_id)
        {
            // Without the session id the sale could never be verified,
            // so it cannot be left pending
            if self.store.mark_failed(&sale.id).unwrap_or(false) {
                self.give_back(reservation.as_ref());
            }
            return Err(e);
        }
        sale.provider_session_id = Some(handle.provider_session_id.clone());

        tracing::info!(
            sale_id = %sale.id,
            gateway = gateway.name(),
            session_id = %handle.provider_session_id,
            total = %sale.total_amount,
            "Purchase initiated"
        );

        Ok(PurchaseTicket {
            sale,
            checkout_url: handle.checkout_url,
        })
    }

    /// Verify a sale's real-world payment outcome and settle it.
    ///
    /// Returns `true` iff the sale is confirmed paid. Safe to call
    /// arbitrarily many times: only the first transition out of
    /// `Pending` has effect, and a transient gateway failure changes
    /// nothing but `last_payment_check_at`.
    pub async fn verify_payment(&self, sale_id: &SaleId) -> Result<bool> {
        let sale = self
            .store
            .get(sale_id)?
            .ok_or_else(|| CommerceError::SaleNotFound(sale_id.to_string()))?;

        match sale.status {
            SaleStatus::Completed => return Ok(true),
            SaleStatus::Failed | SaleStatus::Refunded => return Ok(false),
            SaleStatus::Pending => {}
        }

        let gateway = self.gateway_for(sale.payment_method)?;
        let session_id = sale.provider_session_id.clone().ok_or_else(|| {
            CommerceError::Storage(format!("pending sale {sale_id} has no provider session"))
        })?;

        match gateway.verify(&session_id).await {
            Ok(PaymentOutcome::Paid(capture)) => {
                if self.store.mark_completed(sale_id, &capture)? {
                    tracing::info!(
                        sale_id = %sale_id,
                        gateway = gateway.name(),
                        payment_id = ?capture.payment_id,
                        "Sale completed"
                    );
                    // Fire-and-forget: artifact failure never rolls
                    // back the confirmation
                    if let Err(e) = self.artifacts.generate(sale_id).await {
                        tracing::warn!(
                            sale_id = %sale_id,
                            error = %e,
                            "Artifact generation failed"
                        );
                    }
                }
                Ok(true)
            }
            Ok(PaymentOutcome::Expired) => {
                // The CAS return gates the release: exactly one caller
                // gives the reservation back
                if self.store.mark_failed(sale_id)? {
                    tracing::info!(
                        sale_id = %sale_id,
                        gateway = gateway.name(),
                        "Checkout session expired, sale failed"
                    );
                    if let Some(id) = sale.sellable_id {
                        if let Err(e) = self.ledger.release(&id, sale.quantity) {
                            tracing::error!(
                                sale_id = %sale_id,
                                sellable_id = %id,
                                error = %e,
                                "Inventory release failed after expiry"
                            );
                        }
                    }
                }
                Ok(false)
            }
            Ok(PaymentOutcome::Pending) => {
                self.store.touch_last_checked(sale_id)?;
                Ok(false)
            }
            Err(e) => {
                // Transient infrastructure failure, not a payment
                // outcome: leave sale and inventory alone
                self.store.touch_last_checked(sale_id)?;
                tracing::warn!(
                    sale_id = %sale_id,
                    gateway = gateway.name(),
                    error = %e,
                    "Verification attempt failed, will retry"
                );
                Ok(false)
            }
        }
    }

    /// Resolve a sale from a provider session/order id (return URL or
    /// webhook metadata) and verify it.
    pub async fn verify_by_provider_session(&self, session_id: &str) -> Result<bool> {
        let sale = self
            .store
            .get_by_provider_session(session_id)?
            .ok_or_else(|| CommerceError::SaleNotFound(session_id.to_string()))?;
        self.verify_payment(&sale.id).await
    }

    /// Re-verify every pending sale not checked since `older_than`
    /// ago. The periodic scheduling lives outside the engine.
    pub async fn sweep_stale(&self, older_than: Duration) -> Result<SweepReport> {
        let cutoff = Utc::now() - older_than;
        let stale = self.store.list_stale_pending(cutoff)?;

        let mut report = SweepReport::default();
        for sale in stale {
            report.checked += 1;
            match self.verify_payment(&sale.id).await {
                Ok(true) => report.completed += 1,
                Ok(false) => {
                    // Distinguish a settled failure from still-pending
                    match self.store.get(&sale.id)? {
                        Some(s) if s.status == SaleStatus::Failed => report.failed += 1,
                        _ => report.still_pending += 1,
                    }
                }
                Err(e) => {
                    tracing::warn!(sale_id = %sale.id, error = %e, "Sweep verification error");
                    report.still_pending += 1;
                }
            }
        }

        if report.checked > 0 {
            tracing::info!(
                checked = report.checked,
                completed = report.completed,
                failed = report.failed,
                still_pending = report.still_pending,
                "Reconciliation sweep finished"
            );
        }

        Ok(report)
    }

    fn give_back(&self, reservation: Option<&Reservation>) {
        if let Some(r) = reservation {
            if let Err(e) = self.ledger.release(&r.sellable_id, r.quantity) {
                tracing::error!(
                    sellable_id = %r.sellable_id,
                    quantity = r.quantity,
                    error = %e,
                    "Compensating release failed"
                );
            }
        }
    }
}

/// Append the sale id as a query parameter
fn with_sale_id(base: &str, sale_id: &SaleId) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}sale_id={sale_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use commerce_core::ledger::MemoryInventoryLedger;
    use commerce_core::model::{ProviderCapture, Sellable};
    use commerce_core::store::MemorySaleStore;
    use commerce_gateways::MockGateway;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingArtifacts {
        invocations: AtomicUsize,
    }

    impl CountingArtifacts {
        fn new() -> Self {
            Self {
                invocations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ArtifactGenerator for CountingArtifacts {
        async fn generate(&self, _sale_id: &SaleId) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        engine: ReconciliationEngine,
        ledger: Arc<MemoryInventoryLedger>,
        store: Arc<MemorySaleStore>,
        gateway: Arc<MockGateway>,
        artifacts: Arc<CountingArtifacts>,
        sellable_id: SellableId,
    }

    fn fixture(max_quantity: Option<u32>) -> Fixture {
        let ledger = Arc::new(MemoryInventoryLedger::new());
        let store = Arc::new(MemorySaleStore::new());
        let gateway = Arc::new(MockGateway::new());
        let artifacts = Arc::new(CountingArtifacts::new());

        let sellable = Sellable::new("Team Registration", dec!(250.00), max_quantity);
        let sellable_id = sellable.id;
        ledger.put(sellable).unwrap();

        let engine = ReconciliationEngine::new(
            store.clone(),
            ledger.clone(),
            EngineConfig::default(),
        )
        .with_stripe(gateway.clone())
        .with_paypal(gateway.clone())
        .with_artifacts(artifacts.clone());

        Fixture {
            engine,
            ledger,
            store,
            gateway,
            artifacts,
            sellable_id,
        }
    }

    fn catalog_request(fx: &Fixture, quantity: u32) -> PurchaseRequest {
        PurchaseRequest {
            buyer: Buyer::new("coach@example.com"),
            item: PurchaseItem::Catalog(fx.sellable_id),
            quantity,
            payment_method: PaymentMethod::Stripe,
            event_id: Some("summer-classic".into()),
        }
    }

    fn reserved(fx: &Fixture) -> u32 {
        fx.ledger
            .get(&fx.sellable_id)
            .unwrap()
            .unwrap()
            .current_quantity
    }

    #[tokio::test]
    async fn test_initiate_reserves_and_creates_pending_sale() {
        let fx = fixture(Some(10));

        let ticket = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 2))
            .await
            .unwrap();

        assert!(ticket.checkout_url.starts_with("https://checkout.mock/"));
        assert_eq!(ticket.sale.total_amount, dec!(500.00));
        assert_eq!(reserved(&fx), 2);

        let stored = fx.store.get(&ticket.sale.id).unwrap().unwrap();
        assert_eq!(stored.status, SaleStatus::Pending);
        assert!(stored.provider_session_id.is_some());
    }

    #[tokio::test]
    async fn test_sold_out_creates_nothing() {
        let fx = fixture(Some(1));

        fx.engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();

        let err = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InsufficientInventory { .. }));

        // Only the first attempt holds inventory, and only one session
        // was ever created
        assert_eq!(reserved(&fx), 1);
        assert_eq!(fx.gateway.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_last_unit_race_sells_exactly_once() {
        let fx = fixture(Some(1));
        let engine = Arc::new(fx.engine);

        let a = tokio::spawn({
            let engine = engine.clone();
            let request = PurchaseRequest {
                buyer: Buyer::new("a@example.com"),
                item: PurchaseItem::Catalog(fx.sellable_id),
                quantity: 1,
                payment_method: PaymentMethod::Stripe,
                event_id: None,
            };
            async move { engine.initiate_purchase(request).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            let request = PurchaseRequest {
                buyer: Buyer::new("b@example.com"),
                item: PurchaseItem::Catalog(fx.sellable_id),
                quantity: 1,
                payment_method: PaymentMethod::Stripe,
                event_id: None,
            };
            async move { engine.initiate_purchase(request).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let won = results.iter().filter(|r| r.is_ok()).count();
        let sold_out = results
            .iter()
            .filter(|r| {
                matches!(r, Err(CommerceError::InsufficientInventory { .. }))
            })
            .count();

        assert_eq!(won, 1);
        assert_eq!(sold_out, 1);
        assert_eq!(
            fx.ledger
                .get(&fx.sellable_id)
                .unwrap()
                .unwrap()
                .current_quantity,
            1
        );
    }

    #[tokio::test]
    async fn test_session_creation_failure_compensates() {
        let fx = fixture(Some(10));
        fx.gateway.fail_create("provider down");

        let err = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::PaymentCreationFailed(_)));

        // Reservation rolled back, sale settled as failed
        assert_eq!(reserved(&fx), 0);
        let sales = fx
            .store
            .list_stale_pending(Utc::now() + Duration::hours(1))
            .unwrap();
        assert!(sales.is_empty());
    }

    #[tokio::test]
    async fn test_paid_outcome_completes_once() {
        let fx = fixture(Some(10));
        let ticket = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();

        fx.gateway
            .push_outcome(PaymentOutcome::Paid(ProviderCapture {
                payment_id: Some("pi_123".into()),
                payer_id: Some("cus_456".into()),
            }));

        assert!(fx.engine.verify_payment(&ticket.sale.id).await.unwrap());
        // Second verify is a no-op returning success: no second
        // gateway call, no second artifact
        assert!(fx.engine.verify_payment(&ticket.sale.id).await.unwrap());

        let sale = fx.store.get(&ticket.sale.id).unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Completed);
        assert!(sale.purchased_at.is_some());
        assert_eq!(sale.provider_payment_id.as_deref(), Some("pi_123"));

        // Inventory unchanged: it was reserved at creation time
        assert_eq!(reserved(&fx), 1);
        assert_eq!(fx.artifacts.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(fx.gateway.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_expiry_releases_exactly_once() {
        let fx = fixture(Some(10));

        // Fill the inventory: 9 units sold elsewhere + 1 pending here
        fx.ledger.reserve(&fx.sellable_id, 9).unwrap();
        let ticket = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();
        assert_eq!(reserved(&fx), 10);

        fx.gateway.push_outcome(PaymentOutcome::Expired);
        assert!(!fx.engine.verify_payment(&ticket.sale.id).await.unwrap());

        let sale = fx.store.get(&ticket.sale.id).unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Failed);
        assert_eq!(reserved(&fx), 9);

        // A later re-verification must not release again
        fx.gateway.push_outcome(PaymentOutcome::Expired);
        assert!(!fx.engine.verify_payment(&ticket.sale.id).await.unwrap());
        assert_eq!(reserved(&fx), 9);

        // The freed unit is sellable again
        assert!(fx.ledger.reserve(&fx.sellable_id, 1).is_ok());
    }

    #[tokio::test]
    async fn test_gateway_error_is_non_destructive() {
        let fx = fixture(Some(10));
        let ticket = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();

        fx.gateway.push_verify_error("connection reset");
        assert!(!fx.engine.verify_payment(&ticket.sale.id).await.unwrap());

        let sale = fx.store.get(&ticket.sale.id).unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Pending);
        assert!(sale.last_payment_check_at.is_some());
        assert_eq!(reserved(&fx), 1);
    }

    #[tokio::test]
    async fn test_pending_outcome_only_touches_check_time() {
        let fx = fixture(Some(10));
        let ticket = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();

        fx.gateway.push_outcome(PaymentOutcome::Pending);
        assert!(!fx.engine.verify_payment(&ticket.sale.id).await.unwrap());

        let sale = fx.store.get(&ticket.sale.id).unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Pending);
        assert!(sale.last_payment_check_at.is_some());
    }

    #[tokio::test]
    async fn test_direct_sale_has_no_inventory_to_release() {
        let fx = fixture(Some(10));

        let ticket = fx
            .engine
            .initiate_purchase(PurchaseRequest {
                buyer: Buyer::new("sponsor@example.com"),
                item: PurchaseItem::Direct {
                    name: "Gold Sponsorship".into(),
                    unit_price: dec!(5000.00),
                },
                quantity: 1,
                payment_method: PaymentMethod::Paypal,
                event_id: None,
            })
            .await
            .unwrap();

        assert!(ticket.sale.sellable_id.is_none());
        assert_eq!(reserved(&fx), 0);

        fx.gateway.push_outcome(PaymentOutcome::Expired);
        assert!(!fx.engine.verify_payment(&ticket.sale.id).await.unwrap());
        assert_eq!(
            fx.store.get(&ticket.sale.id).unwrap().unwrap().status,
            SaleStatus::Failed
        );
        // Catalog counter untouched throughout
        assert_eq!(reserved(&fx), 0);
    }

    #[tokio::test]
    async fn test_verify_by_provider_session() {
        let fx = fixture(Some(10));
        let ticket = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();
        let session_id = ticket.sale.provider_session_id.clone().unwrap();

        fx.gateway
            .push_outcome(PaymentOutcome::Paid(ProviderCapture::default()));
        assert!(fx
            .engine
            .verify_by_provider_session(&session_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_sweep_settles_stale_sales() {
        let fx = fixture(Some(10));

        let paid = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();
        let expired = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();
        let limbo = fx
            .engine
            .initiate_purchase(catalog_request(&fx, 1))
            .await
            .unwrap();

        // Settle two of the three up front; a sweep iterates the map
        // in arbitrary order, so a shared outcome queue can't target
        // specific sales
        fx.gateway
            .push_outcome(PaymentOutcome::Paid(ProviderCapture::default()));
        fx.engine.verify_payment(&paid.sale.id).await.unwrap();
        fx.gateway.push_outcome(PaymentOutcome::Expired);
        fx.engine.verify_payment(&expired.sale.id).await.unwrap();

        // Only the limbo sale is still pending; sweep with a zero
        // threshold picks it up and it stays pending
        let report = fx.engine.sweep_stale(Duration::zero()).await.unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.still_pending, 1);
        assert_eq!(report.completed, 0);

        let sale = fx.store.get(&limbo.sale.id).unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Pending);
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_rejected() {
        let ledger = Arc::new(MemoryInventoryLedger::new());
        let store = Arc::new(MemorySaleStore::new());
        let engine =
            ReconciliationEngine::new(store, ledger, EngineConfig::default());

        let err = engine
            .initiate_purchase(PurchaseRequest {
                buyer: Buyer::new("x@example.com"),
                item: PurchaseItem::Direct {
                    name: "Sponsorship".into(),
                    unit_price: dec!(100),
                },
                quantity: 1,
                payment_method: PaymentMethod::Stripe,
                event_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Config(_)));
    }

    #[test]
    fn test_sale_id_query_parameter() {
        let id = SaleId::generate();
        let url = with_sale_id("https://example.com/return", &id);
        assert_eq!(url, format!("https://example.com/return?sale_id={id}"));

        let url = with_sale_id("https://example.com/return?lang=en", &id);
        assert_eq!(
            url,
            format!("https://example.com/return?lang=en&sale_id={id}")
        );
    }
}
