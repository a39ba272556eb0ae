//! Domain Model
//!
//! Sellables, Sales, and the money helpers shared by the ledger, the
//! store, and the payment gateways.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CommerceError, Result};

/// Identifier for a purchasable catalog unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SellableId(Uuid);

impl SellableId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for SellableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a sale (one purchase transaction)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaleId(Uuid);

impl SaleId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for SaleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A purchasable unit with bounded or unbounded inventory
/// (team registration, ticket, vendor booth, banner slot, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sellable {
    /// Identifier
    pub id: SellableId,

    /// Display name (appears on the hosted checkout page)
    pub name: String,

    /// Optional description for the checkout line item
    pub description: Option<String>,

    /// Unit price in major currency units
    pub price: Decimal,

    /// Maximum sellable quantity; `None` means unlimited
    pub max_quantity: Option<u32>,

    /// Units already reserved or sold
    pub current_quantity: u32,
}

impl Sellable {
    /// Create a new sellable with nothing reserved yet
    pub fn new(name: impl Into<String>, price: Decimal, max_quantity: Option<u32>) -> Self {
        Self {
            id: SellableId::generate(),
            name: name.into(),
            description: None,
            price,
            max_quantity,
            current_quantity: 0,
        }
    }

    /// Units still available; `None` means unlimited
    pub fn remaining(&self) -> Option<u32> {
        self.max_quantity
            .map(|max| max.saturating_sub(self.current_quantity))
    }

    /// Whether this sellable has no inventory bound
    pub const fn is_unlimited(&self) -> bool {
        self.max_quantity.is_none()
    }
}

/// The buyer of a sale: the fields gateways need to prefill checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Buyer {
    /// User identifier
    pub id: Uuid,

    /// Email, forwarded to the hosted checkout page
    pub email: String,

    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,
}

impl Buyer {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: None,
        }
    }
}

/// Sale lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    /// Created, inventory reserved, awaiting payment confirmation
    Pending,
    /// Payment confirmed; terminal
    Completed,
    /// Session expired or creation failed; reservation released; terminal
    Failed,
    /// Refunded via the external refund flow; terminal
    Refunded,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Failed => "failed",
            SaleStatus::Refunded => "refunded",
        }
    }
}

/// Which payment provider handles a sale
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paypal => "paypal",
        }
    }
}

/// Capture details a gateway reports when a payment is confirmed.
/// Persisted onto the sale at completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapture {
    /// Payment-intent id (Stripe) or capture id (PayPal)
    pub payment_id: Option<String>,

    /// Customer id (Stripe) or payer id (PayPal)
    pub payer_id: Option<String>,
}

/// What a sale is selling: either a catalog sellable (inventory-backed)
/// or a directly priced item such as a sponsorship package.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaleItem {
    /// Catalog reference; `None` for direct sales with no inventory
    pub sellable_id: Option<SellableId>,

    /// Line-item name shown at checkout
    pub name: String,

    /// Optional line-item description
    pub description: Option<String>,

    /// Unit price in major currency units
    pub unit_price: Decimal,
}

/// One purchase transaction: the unit of payment reconciliation.
///
/// Created in `Pending` with inventory already reserved; transitions
/// to `Completed` exactly once, or to `Failed` (releasing the
/// reservation). The provider correlation fields are owned exclusively
/// by the sale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sale {
    /// Identifier
    pub id: SaleId,

    /// Event this purchase belongs to, when applicable
    pub event_id: Option<String>,

    /// Catalog reference; `None` for sponsorship-style direct sales
    pub sellable_id: Option<SellableId>,

    /// Line-item name at purchase time
    pub item_name: String,

    /// Line-item description at purchase time
    pub item_description: Option<String>,

    /// Who is buying
    pub buyer: Buyer,

    /// Units purchased (always positive)
    pub quantity: u32,

    /// Unit price at purchase time
    pub unit_price: Decimal,

    /// `unit_price * quantity`, exact decimal arithmetic
    pub total_amount: Decimal,

    /// Lifecycle status
    pub status: SaleStatus,

    /// Provider handling this sale
    pub payment_method: PaymentMethod,

    /// Checkout session id (Stripe) or order id (PayPal)
    pub provider_session_id: Option<String>,

    /// Payment-intent / capture id, set on completion
    pub provider_payment_id: Option<String>,

    /// Customer / payer id, set on completion
    pub provider_payer_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set exactly once, on completion
    pub purchased_at: Option<DateTime<Utc>>,

    /// Updated on every verification attempt; drives re-check scheduling
    pub last_payment_check_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// Create a new pending sale.
    ///
    /// Fails on a zero quantity or a negative unit price; the total is
    /// computed here so it is always consistent with the inputs.
    pub fn new(
        buyer: Buyer,
        item: SaleItem,
        quantity: u32,
        payment_method: PaymentMethod,
    ) -> Result<Self> {
        if quantity == 0 {
            return Err(CommerceError::InvalidAmount(
                "quantity must be positive".into(),
            ));
        }
        if item.unit_price.is_sign_negative() {
            return Err(CommerceError::InvalidAmount(format!(
                "unit price must not be negative: {}",
                item.unit_price
            )));
        }

        let total_amount = item.unit_price * Decimal::from(quantity);

        Ok(Self {
            id: SaleId::generate(),
            event_id: None,
            sellable_id: item.sellable_id,
            item_name: item.name,
            item_description: item.description,
            buyer,
            quantity,
            unit_price: item.unit_price,
            total_amount,
            status: SaleStatus::Pending,
            payment_method,
            provider_session_id: None,
            provider_payment_id: None,
            provider_payer_id: None,
            created_at: Utc::now(),
            purchased_at: None,
            last_payment_check_at: None,
        })
    }

    /// Whether this sale reserved catalog inventory that a failure
    /// must give back
    pub const fn holds_inventory(&self) -> bool {
        self.sellable_id.is_some()
    }
}

/// Convert a major-unit decimal amount to integer minor units (cents).
///
/// Fails on negative amounts and on sub-cent precision rather than
/// rounding; gateways must never silently reshape a price.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() {
        return Err(CommerceError::InvalidAmount(format!(
            "amount must not be negative: {amount}"
        )));
    }

    let minor = amount * Decimal::ONE_HUNDRED;
    if !minor.fract().is_zero() {
        return Err(CommerceError::InvalidAmount(format!(
            "amount has sub-cent precision: {amount}"
        )));
    }

    minor
        .to_i64()
        .ok_or_else(|| CommerceError::InvalidAmount(format!("amount out of range: {amount}")))
}
