//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use commerce_core::{
    Buyer, CommerceError, InventoryLedger, PaymentMethod, Sale, SaleId, SaleStore, Sellable,
    SellableId,
};
use commerce_engine::{PurchaseItem, PurchaseRequest, PurchaseTicket};
use commerce_gateways::StripeWebhookEvent;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub paypal_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSellableRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    /// Omit for unlimited inventory
    #[serde(default)]
    pub max_quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SellableResponse {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub max_quantity: Option<u32>,
    pub current_quantity: u32,
    pub remaining: Option<u32>,
}

impl From<Sellable> for SellableResponse {
    fn from(sellable: Sellable) -> Self {
        Self {
            id: *sellable.id.as_uuid(),
            name: sellable.name.clone(),
            price: sellable.price,
            max_quantity: sellable.max_quantity,
            current_quantity: sellable.current_quantity,
            remaining: sellable.remaining(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchaseApiRequest {
    /// Catalog purchase; mutually exclusive with `item_name`/`unit_price`
    #[serde(default)]
    pub sellable_id: Option<Uuid>,

    /// Direct (sponsorship-style) purchase
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,

    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub payment_method: PaymentMethod,
    pub email: String,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub sale_id: Uuid,
    pub checkout_url: String,
    pub total_amount: Decimal,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub sale_id: Uuid,
    pub status: &'static str,
    pub item_name: String,
    pub quantity: u32,
    pub total_amount: Decimal,
    pub payment_method: &'static str,
    pub purchased_at: Option<DateTime<Utc>>,
}

impl From<Sale> for SaleResponse {
    fn from(sale: Sale) -> Self {
        Self {
            sale_id: *sale.id.as_uuid(),
            status: sale.status.as_str(),
            item_name: sale.item_name,
            quantity: sale.quantity,
            total_amount: sale.total_amount,
            payment_method: sale.payment_method.as_str(),
            purchased_at: sale.purchased_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub paid: bool,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ReturnParams {
    pub sale_id: Uuid,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map domain errors onto HTTP responses
fn api_error(error: &CommerceError) -> ApiError {
    let (status, code) = match error {
        CommerceError::InsufficientInventory { .. } => (StatusCode::CONFLICT, "SOLD_OUT"),
        CommerceError::SellableNotFound(_) | CommerceError::SaleNotFound(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        }
        CommerceError::InvalidAmount(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_AMOUNT"),
        CommerceError::PaymentCreationFailed(_) | CommerceError::Gateway(_) => {
            (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR")
        }
        CommerceError::WebhookSignature(_) | CommerceError::WebhookParse(_) => {
            (StatusCode::BAD_REQUEST, "BAD_WEBHOOK")
        }
        CommerceError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    };

    (
        status,
        Json(ErrorResponse {
            error: error.user_message().to_string(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.stripe_configured,
        paypal_configured: state.paypal_configured,
    })
}

/// List the catalog with remaining inventory
pub async fn list_sellables(State(state): State<AppState>) -> Json<Vec<SellableResponse>> {
    let sellables = state
        .ledger
        .list()
        .into_iter()
        .map(SellableResponse::from)
        .collect();
    Json(sellables)
}

/// Seed a sellable into the catalog
pub async fn create_sellable(
    State(state): State<AppState>,
    Json(payload): Json<CreateSellableRequest>,
) -> Result<(StatusCode, Json<SellableResponse>), ApiError> {
    let mut sellable = Sellable::new(payload.name, payload.price, payload.max_quantity);
    sellable.description = payload.description;

    let response = SellableResponse::from(sellable.clone());
    state.ledger.put(sellable).map_err(|e| api_error(&e))?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Start a purchase: reserves inventory and returns the provider
/// checkout URL to redirect the buyer to
pub async fn purchase(
    State(state): State<AppState>,
    Json(payload): Json<PurchaseApiRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let item = match (payload.sellable_id, payload.item_name, payload.unit_price) {
        (Some(id), _, _) => PurchaseItem::Catalog(SellableId::from_uuid(id)),
        (None, Some(name), Some(unit_price)) => PurchaseItem::Direct { name, unit_price },
        _ => {
            return Err(api_error(&CommerceError::InvalidAmount(
                "provide either sellable_id or item_name + unit_price".into(),
            )));
        }
    };

    let mut buyer = Buyer::new(payload.email);
    buyer.name = payload.buyer_name;

    let request = PurchaseRequest {
        buyer,
        item,
        quantity: payload.quantity,
        payment_method: payload.payment_method,
        event_id: payload.event_id,
    };

    let PurchaseTicket { sale, checkout_url } = state
        .engine
        .initiate_purchase(request)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Purchase initiation failed");
            api_error(&e)
        })?;

    Ok(Json(PurchaseResponse {
        sale_id: *sale.id.as_uuid(),
        checkout_url,
        total_amount: sale.total_amount,
        status: sale.status.as_str(),
    }))
}

/// Look up a sale
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaleResponse>, ApiError> {
    let sale_id = SaleId::from_uuid(id);
    let sale = state
        .store
        .get(&sale_id)
        .map_err(|e| api_error(&e))?
        .ok_or_else(|| api_error(&CommerceError::SaleNotFound(id.to_string())))?;

    Ok(Json(SaleResponse::from(sale)))
}

/// Verify a sale's payment status against the provider
pub async fn verify_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let sale_id = SaleId::from_uuid(id);
    verify_and_report(&state, &sale_id).await
}

/// Provider return URL: the buyer lands here after checkout, carrying
/// the sale id appended at session-creation time
pub async fn checkout_return(
    State(state): State<AppState>,
    Query(params): Query<ReturnParams>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let sale_id = SaleId::from_uuid(params.sale_id);
    verify_and_report(&state, &sale_id).await
}

async fn verify_and_report(
    state: &AppState,
    sale_id: &SaleId,
) -> Result<Json<VerifyResponse>, ApiError> {
    let paid = state
        .engine
        .verify_payment(sale_id)
        .await
        .map_err(|e| api_error(&e))?;

    let sale = state
        .store
        .get(sale_id)
        .map_err(|e| api_error(&e))?
        .ok_or_else(|| api_error(&CommerceError::SaleNotFound(sale_id.to_string())))?;

    let message = match sale.status {
        commerce_core::SaleStatus::Completed => "Payment confirmed.",
        commerce_core::SaleStatus::Failed => {
            "Payment could not be confirmed, please try again."
        }
        _ => "We are verifying your payment, please check back.",
    };

    Ok(Json(VerifyResponse {
        paid,
        status: sale.status.as_str(),
        message,
    }))
}

/// Stripe webhook endpoint. The event is only a trigger: settlement
/// runs through the engine so a webhook racing a poll is safe.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let webhook = state.stripe_webhook.as_ref().ok_or_else(|| {
        api_error(&CommerceError::Config("stripe webhook not configured".into()))
    })?;

    let signature = headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            api_error(&CommerceError::WebhookSignature(
                "missing Stripe-Signature header".into(),
            ))
        })?;

    let event = webhook.parse(&body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        api_error(&e)
    })?;

    match event {
        StripeWebhookEvent::CheckoutCompleted { session_id }
        | StripeWebhookEvent::CheckoutExpired { session_id } => {
            match state.engine.verify_by_provider_session(&session_id).await {
                Ok(paid) => {
                    tracing::info!(session_id = %session_id, paid, "Webhook processed");
                }
                Err(CommerceError::SaleNotFound(_)) => {
                    // Sessions created by another environment against
                    // the same Stripe account; acknowledge and move on
                    tracing::warn!(session_id = %session_id, "Webhook for unknown session");
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Webhook verify failed");
                }
            }
        }
        StripeWebhookEvent::Other { event_type } => {
            tracing::debug!(event_type = %event_type, "Unhandled webhook event");
        }
    }

    Ok(StatusCode::OK)
}
