//! Error Types

use thiserror::Error;

/// Result type alias for commerce operations
pub type Result<T> = std::result::Result<T, CommerceError>;

/// Commerce error types
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Reservation refused: not enough units left
    #[error("Insufficient inventory for {sellable_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        sellable_id: String,
        requested: u32,
        available: u32,
    },

    /// A release would push the consumed counter below zero.
    /// This is an accounting bug, never a normal outcome.
    #[error("Inventory underflow for {sellable_id}: releasing {requested} with only {current} reserved")]
    InventoryUnderflow {
        sellable_id: String,
        requested: u32,
        current: u32,
    },

    /// Sellable not present in the catalog
    #[error("Sellable not found: {0}")]
    SellableNotFound(String),

    /// Sale not present in the store
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Payment provider API failure (network, auth, malformed response).
    /// Transient: safe to retry verification later, must never trigger
    /// inventory release.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// The provider could not even create a checkout session after a
    /// reservation was made; the caller compensates immediately.
    #[error("Payment session creation failed: {0}")]
    PaymentCreationFailed(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Invalid monetary amount or quantity
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CommerceError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommerceError::Gateway(_) | CommerceError::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            CommerceError::InsufficientInventory { .. } => "Sold out.",
            CommerceError::Gateway(_) => {
                "We are verifying your payment, please check back shortly."
            }
            CommerceError::PaymentCreationFailed(_) => {
                "Payment could not be started. Please try again."
            }
            CommerceError::SellableNotFound(_) => "This item is no longer available.",
            CommerceError::SaleNotFound(_) => "Order not found.",
            CommerceError::InvalidAmount(_) => "Invalid order amount.",
            _ => "An error occurred processing your request.",
        }
    }
}
