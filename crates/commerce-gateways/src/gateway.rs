//! Checkout Gateway Trait
//!
//! Abstraction over provider-hosted checkout flows (Strategy pattern).
//! Implement this for each provider: Stripe, PayPal, ...

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use commerce_core::error::Result;
use commerce_core::model::{ProviderCapture, SaleId};

/// What a verification attempt learned about a checkout session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Payment confirmed; capture details to persist onto the sale
    Paid(ProviderCapture),

    /// Still in flight: the buyer has not finished (or the provider
    /// has not settled yet). Check again later.
    Pending,

    /// The session/order is definitively dead (expired or voided).
    /// The only outcome that may release reserved inventory.
    Expired,
}

/// Everything a gateway needs to create a hosted checkout session
/// for one sale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Sale this session pays for; carried in provider metadata
    pub sale_id: SaleId,

    /// Line-item name shown on the hosted page
    pub item_name: String,

    /// Optional line-item description
    pub item_description: Option<String>,

    /// Unit price in major currency units
    pub unit_price: Decimal,

    /// Units purchased
    pub quantity: u32,

    /// Buyer email, prefilled at checkout
    pub customer_email: String,

    /// Where the provider sends the buyer after payment; already
    /// carries the sale id as a query parameter
    pub success_url: String,

    /// Where the provider sends the buyer on cancel
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Provider session id (Stripe) or order id (PayPal)
    pub provider_session_id: String,

    /// URL to redirect the buyer to
    pub checkout_url: String,
}

/// Checkout session gateway (Strategy pattern).
///
/// `verify` is read-only for Stripe but may perform an explicit
/// capture for PayPal; see the crate docs for the asymmetry.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    /// Create a hosted checkout session/order for a sale and return
    /// the redirect URL.
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionHandle>;

    /// Retrieve (and for PayPal, possibly capture) the payment status
    /// of a previously created session.
    async fn verify(&self, provider_session_id: &str) -> Result<PaymentOutcome>;

    /// Gateway name for logging
    fn name(&self) -> &str;
}
