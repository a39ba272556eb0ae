//! PayPal Checkout Gateway
//!
//! Orders v2 REST client. Unlike Stripe's hosted checkout, PayPal
//! does not capture on buyer approval: an order sits in `APPROVED`
//! until an explicit capture call, so `verify` here performs that
//! capture when it finds an approved order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use commerce_core::error::{CommerceError, Result};
use commerce_core::model::{ProviderCapture, to_minor_units};

use crate::gateway::{CheckoutGateway, PaymentOutcome, SessionHandle, SessionRequest};

const SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

/// PayPal API configuration
#[derive(Clone, Debug)]
pub struct PayPalConfig {
    /// API base URL (sandbox or live)
    pub base_url: String,

    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// ISO currency code for orders
    pub currency: String,
}

impl PayPalConfig {
    /// Create from environment variables (`PAYPAL_CLIENT_ID`,
    /// `PAYPAL_CLIENT_SECRET`, optional `PAYPAL_BASE_URL` and
    /// `PAYPAL_CURRENCY`)
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("PAYPAL_CLIENT_ID")
            .map_err(|_| CommerceError::Config("PAYPAL_CLIENT_ID not set".into()))?;
        let client_secret = std::env::var("PAYPAL_CLIENT_SECRET")
            .map_err(|_| CommerceError::Config("PAYPAL_CLIENT_SECRET not set".into()))?;
        let base_url =
            std::env::var("PAYPAL_BASE_URL").unwrap_or_else(|_| SANDBOX_BASE_URL.into());
        let currency = std::env::var("PAYPAL_CURRENCY").unwrap_or_else(|_| "USD".into());

        Ok(Self {
            base_url,
            client_id,
            client_secret,
            currency,
        })
    }
}

/// Cached OAuth2 access token
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// PayPal checkout gateway
pub struct PayPalGateway {
    http: reqwest::Client,
    config: PayPalConfig,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalGateway {
    /// Create from configuration
    pub fn from_config(config: PayPalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token: Mutex::new(None),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_config(PayPalConfig::from_env()?))
    }

    /// Get a client-credentials access token, reusing the cached one
    /// until shortly before it expires.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.base_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal token request: {e}")))?;

        let response = require_success(response, "token").await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal token response: {e}")))?;

        // Refresh a minute early to avoid using a token mid-expiry
        let expires_at = Utc::now() + chrono::Duration::seconds(token.expires_in.saturating_sub(60));
        let access_token = token.access_token.clone();

        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access_token)
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderResponse> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/v2/checkout/orders/{order_id}",
                self.config.base_url
            ))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal get order: {e}")))?;

        let response = require_success(response, "get order").await?;
        response
            .json()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal order response: {e}")))
    }

    /// Capture an approved order. A refused capture (4xx from PayPal)
    /// is not a transport failure: the order simply is not capturable
    /// yet, so the caller treats it as still pending.
    async fn capture_order(&self, order_id: &str) -> Result<Option<OrderResponse>> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{order_id}/capture",
                self.config.base_url
            ))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal capture: {e}")))?;

        if response.status().is_client_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(order_id, body = %body, "PayPal capture refused");
            return Ok(None);
        }

        let response = require_success(response, "capture").await?;
        let order = response
            .json()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal capture response: {e}")))?;
        Ok(Some(order))
    }
}

#[async_trait]
impl CheckoutGateway for PayPalGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionHandle> {
        // Same refusal as the Stripe path: a sub-cent price must fail,
        // not get reshaped by the two-decimal wire format below
        to_minor_units(request.unit_price)?;

        let total = request.unit_price * Decimal::from(request.quantity);
        let body = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnitRequest {
                reference_id: request.sale_id.to_string(),
                description: Some(request.item_name.clone()),
                amount: Amount {
                    currency_code: self.config.currency.clone(),
                    value: format!("{total:.2}"),
                },
            }],
            application_context: ApplicationContext {
                return_url: request.success_url.clone(),
                cancel_url: request.cancel_url.clone(),
                user_action: "PAY_NOW",
            },
        };

        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.config.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal create order: {e}")))?;

        let response = require_success(response, "create order").await?;
        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| CommerceError::Gateway(format!("PayPal order response: {e}")))?;

        let checkout_url = approve_link(&order).ok_or_else(|| {
            CommerceError::Gateway("no approve link in PayPal order".into())
        })?;

        tracing::info!(
            sale_id = %request.sale_id,
            order_id = %order.id,
            "Created PayPal order"
        );

        Ok(SessionHandle {
            provider_session_id: order.id,
            checkout_url,
        })
    }

    async fn verify(&self, provider_session_id: &str) -> Result<PaymentOutcome> {
        let order = self.get_order(provider_session_id).await?;

        match order_disposition(&order.status) {
            OrderDisposition::Settled => Ok(PaymentOutcome::Paid(capture_details(&order))),
            OrderDisposition::NeedsCapture => {
                // Buyer approved but nothing captured yet: capture now.
                match self.capture_order(provider_session_id).await? {
                    Some(captured) => {
                        let outcome = capture_outcome(&captured);
                        if matches!(outcome, PaymentOutcome::Paid(_)) {
                            tracing::info!(
                                order_id = provider_session_id,
                                "Captured PayPal order"
                            );
                        } else {
                            tracing::warn!(
                                order_id = provider_session_id,
                                status = %captured.status,
                                "PayPal capture did not complete"
                            );
                        }
                        Ok(outcome)
                    }
                    None => Ok(PaymentOutcome::Pending),
                }
            }
            OrderDisposition::Dead => Ok(PaymentOutcome::Expired),
            OrderDisposition::InFlight => Ok(PaymentOutcome::Pending),
        }
    }

    fn name(&self) -> &str {
        "paypal"
    }
}

/// Non-2xx responses become gateway errors carrying the body for the logs
async fn require_success(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(CommerceError::Gateway(format!(
            "PayPal {context} returned {status}: {body}"
        )))
    }
}

/// What an order status string means for reconciliation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OrderDisposition {
    /// Captured; payment is done
    Settled,
    /// Approved by the buyer, awaiting the explicit capture
    NeedsCapture,
    /// Voided or expired; definitively dead
    Dead,
    /// Created / payer action pending; check again later
    InFlight,
}

fn order_disposition(status: &str) -> OrderDisposition {
    match status {
        "COMPLETED" => OrderDisposition::Settled,
        "APPROVED" => OrderDisposition::NeedsCapture,
        "VOIDED" | "EXPIRED" => OrderDisposition::Dead,
        _ => OrderDisposition::InFlight,
    }
}

/// Map a capture response to a payment outcome. Only a `COMPLETED`
/// capture is payment; anything else (declined funding, still
/// processing) leaves the sale pending for the next verification.
fn capture_outcome(captured: &OrderResponse) -> PaymentOutcome {
    if captured.status == "COMPLETED" {
        PaymentOutcome::Paid(capture_details(captured))
    } else {
        PaymentOutcome::Pending
    }
}

/// Pull capture and payer identifiers out of an order
fn capture_details(order: &OrderResponse) -> ProviderCapture {
    let payment_id = order
        .purchase_units
        .iter()
        .flatten()
        .filter_map(|unit| unit.payments.as_ref())
        .flat_map(|payments| payments.captures.iter().flatten())
        .map(|capture| capture.id.clone())
        .next();

    let payer_id = order
        .payer
        .as_ref()
        .and_then(|payer| payer.payer_id.clone());

    ProviderCapture {
        payment_id,
        payer_id,
    }
}

fn approve_link(order: &OrderResponse) -> Option<String> {
    order
        .links
        .iter()
        .flatten()
        .find(|link| link.rel == "approve" || link.rel == "payer-action")
        .map(|link| link.href.clone())
}

// ============================================================================
// Wire Types (Orders v2)
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnitRequest>,
    application_context: ApplicationContext,
}

#[derive(Debug, Serialize)]
struct PurchaseUnitRequest {
    reference_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    amount: Amount,
}

#[derive(Debug, Serialize)]
struct Amount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ApplicationContext {
    return_url: String,
    cancel_url: String,
    user_action: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Option<Vec<Link>>,
    #[serde(default)]
    purchase_units: Option<Vec<PurchaseUnitResponse>>,
    #[serde(default)]
    payer: Option<Payer>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnitResponse {
    #[serde(default)]
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Option<Vec<Capture>>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Payer {
    #[serde(default)]
    payer_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::model::SaleId;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_sub_cent_price_rejected_before_any_request() {
        let gateway = PayPalGateway::from_config(PayPalConfig {
            base_url: "http://paypal.invalid".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            currency: "USD".into(),
        });

        // Rejection happens before the token request: no network, and
        // the wire format never gets a chance to truncate the price
        let err = gateway
            .create_session(&SessionRequest {
                sale_id: SaleId::generate(),
                item_name: "Team Registration".into(),
                item_description: None,
                unit_price: dec!(10.005),
                quantity: 1,
                customer_email: "coach@example.com".into(),
                success_url: "https://example.com/return".into(),
                cancel_url: "https://example.com/cancel".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidAmount(_)));
    }

    #[test]
    fn test_capture_outcome_completed_is_paid() {
        let captured: OrderResponse = serde_json::from_value(json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "payer": { "payer_id": "QYR5Z8XDVJNXQ" },
            "purchase_units": [{
                "payments": {
                    "captures": [{ "id": "3C679366HH908993F" }]
                }
            }]
        }))
        .unwrap();

        match capture_outcome(&captured) {
            PaymentOutcome::Paid(details) => {
                assert_eq!(details.payment_id.as_deref(), Some("3C679366HH908993F"));
                assert_eq!(details.payer_id.as_deref(), Some("QYR5Z8XDVJNXQ"));
            }
            other => panic!("expected Paid, got {other:?}"),
        }
    }

    #[test]
    fn test_capture_outcome_anything_else_stays_pending() {
        for status in ["PENDING", "DECLINED", "PAYER_ACTION_REQUIRED"] {
            let captured: OrderResponse = serde_json::from_value(json!({
                "id": "5O190127TN364715T",
                "status": status,
            }))
            .unwrap();
            assert_eq!(capture_outcome(&captured), PaymentOutcome::Pending);
        }
    }

    #[test]
    fn test_order_disposition_mapping() {
        assert_eq!(order_disposition("COMPLETED"), OrderDisposition::Settled);
        assert_eq!(order_disposition("APPROVED"), OrderDisposition::NeedsCapture);
        assert_eq!(order_disposition("VOIDED"), OrderDisposition::Dead);
        assert_eq!(order_disposition("EXPIRED"), OrderDisposition::Dead);
        assert_eq!(order_disposition("CREATED"), OrderDisposition::InFlight);
        assert_eq!(
            order_disposition("PAYER_ACTION_REQUIRED"),
            OrderDisposition::InFlight
        );
    }

    #[test]
    fn test_capture_details_from_completed_order() {
        let order: OrderResponse = serde_json::from_value(json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "payer": { "payer_id": "QYR5Z8XDVJNXQ" },
            "purchase_units": [{
                "payments": {
                    "captures": [{ "id": "3C679366HH908993F", "status": "COMPLETED" }]
                }
            }]
        }))
        .unwrap();

        let details = capture_details(&order);
        assert_eq!(details.payment_id.as_deref(), Some("3C679366HH908993F"));
        assert_eq!(details.payer_id.as_deref(), Some("QYR5Z8XDVJNXQ"));
    }

    #[test]
    fn test_approve_link_extraction() {
        let order: OrderResponse = serde_json::from_value(json!({
            "id": "5O190127TN364715T",
            "status": "CREATED",
            "links": [
                { "href": "https://api-m.paypal.com/v2/checkout/orders/5O1", "rel": "self" },
                { "href": "https://www.paypal.com/checkoutnow?token=5O1", "rel": "approve" }
            ]
        }))
        .unwrap();

        assert_eq!(
            approve_link(&order).as_deref(),
            Some("https://www.paypal.com/checkoutnow?token=5O1")
        );
    }

    #[test]
    fn test_order_without_captures_yields_empty_details() {
        let order: OrderResponse = serde_json::from_value(json!({
            "id": "5O190127TN364715T",
            "status": "APPROVED"
        }))
        .unwrap();

        let details = capture_details(&order);
        assert!(details.payment_id.is_none());
        assert!(details.payer_id.is_none());
    }
}
