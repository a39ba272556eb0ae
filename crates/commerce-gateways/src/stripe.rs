//! Stripe Checkout Gateway
//!
//! Hosted Checkout Sessions in one-time `Payment` mode. Stripe
//! captures automatically when the buyer completes the hosted page,
//! so verification here is a pure read of the session.

use std::collections::HashMap;

use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    CheckoutSessionStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    Currency,
};

use async_trait::async_trait;

use commerce_core::error::{CommerceError, Result};
use commerce_core::model::{ProviderCapture, to_minor_units};

use crate::gateway::{CheckoutGateway, PaymentOutcome, SessionHandle, SessionRequest};

/// Stripe checkout gateway
pub struct StripeGateway {
    client: Client,
    currency: Currency,
}

impl StripeGateway {
    /// Create a new gateway with the default USD currency
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            currency: Currency::USD,
        }
    }

    /// Override the checkout currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Create from environment variables (`STRIPE_SECRET_KEY`)
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| CommerceError::Config("STRIPE_SECRET_KEY not set".into()))?;
        Ok(Self::new(&secret_key))
    }

    /// Get the underlying Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl CheckoutGateway for StripeGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionHandle> {
        let unit_amount = to_minor_units(request.unit_price)?;
        let sale_id = request.sale_id.to_string();

        let mut params = CreateCheckoutSession::new();
        params.customer_email = Some(&request.customer_email);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.client_reference_id = Some(&sale_id);

        // Metadata links the session back to the sale for webhooks
        let mut metadata = HashMap::new();
        metadata.insert("sale_id".to_string(), sale_id.clone());
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(u64::from(request.quantity)),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: self.currency,
                unit_amount: Some(unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.item_name.clone(),
                    description: request.item_description.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| CommerceError::Gateway(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| CommerceError::Gateway("no checkout URL returned".into()))?;

        tracing::info!(
            sale_id = %request.sale_id,
            session_id = %session.id,
            "Created Stripe checkout session"
        );

        Ok(SessionHandle {
            provider_session_id: session.id.to_string(),
            checkout_url,
        })
    }

    async fn verify(&self, provider_session_id: &str) -> Result<PaymentOutcome> {
        let id = provider_session_id
            .parse::<CheckoutSessionId>()
            .map_err(|e| CommerceError::Gateway(format!("invalid session id: {e}")))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| CommerceError::Gateway(e.to_string()))?;

        let capture = ProviderCapture {
            payment_id: session
                .payment_intent
                .as_ref()
                .map(|pi| pi.id().to_string()),
            payer_id: session.customer.as_ref().map(|c| c.id().to_string()),
        };

        Ok(session_outcome(
            session.payment_status,
            session.status,
            capture,
        ))
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

/// Map Stripe session state to a payment outcome.
///
/// `payment_status == paid` wins over everything; an expired session
/// is the only definitive negative. Anything else (open, complete but
/// unpaid async methods, ...) stays pending.
fn session_outcome(
    payment_status: CheckoutSessionPaymentStatus,
    status: Option<CheckoutSessionStatus>,
    capture: ProviderCapture,
) -> PaymentOutcome {
    if payment_status == CheckoutSessionPaymentStatus::Paid {
        return PaymentOutcome::Paid(capture);
    }

    match status {
        Some(CheckoutSessionStatus::Expired) => PaymentOutcome::Expired,
        _ => PaymentOutcome::Pending,
    }
}
