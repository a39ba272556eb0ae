//! Event Commerce HTTP Server
//!
//! Axum server exposing the checkout core: catalog seeding, purchase
//! initiation, payment verification, and the Stripe webhook endpoint.
//! A background task periodically sweeps stale pending sales so
//! abandoned checkouts give their inventory back without relying on
//! webhooks alone.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commerce_core::{MemoryInventoryLedger, MemorySaleStore};
use commerce_engine::{EngineConfig, ReconciliationEngine};
use commerce_gateways::{CheckoutGateway, PayPalGateway, StripeGateway, StripeWebhook};

use crate::handlers::{
    checkout_return, create_sellable, get_sale, health_check, list_sellables, purchase,
    stripe_webhook, verify_sale,
};
use crate::state::AppState;

fn env_seconds(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Storage
    let ledger = Arc::new(MemoryInventoryLedger::new());
    let store = Arc::new(MemorySaleStore::new());

    // Gateways (each optional; purchases for an unconfigured method
    // are rejected at initiation time)
    let stripe = StripeGateway::from_env().ok().map(|gateway| {
        let gateway: Arc<dyn CheckoutGateway> = Arc::new(gateway);
        gateway
    });
    let paypal = PayPalGateway::from_env().ok().map(|gateway| {
        let gateway: Arc<dyn CheckoutGateway> = Arc::new(gateway);
        gateway
    });

    if stripe.is_some() {
        tracing::info!("✓ Stripe configured");
    } else {
        tracing::warn!("⚠ Stripe not configured - set STRIPE_SECRET_KEY in .env");
    }
    if paypal.is_some() {
        tracing::info!("✓ PayPal configured");
    } else {
        tracing::warn!("⚠ PayPal not configured - set PAYPAL_CLIENT_ID / PAYPAL_CLIENT_SECRET");
    }

    let stripe_webhook_parser = StripeWebhook::from_env().ok().map(Arc::new);
    if stripe_webhook_parser.is_none() {
        tracing::warn!("⚠ Stripe webhook not configured - set STRIPE_WEBHOOK_SECRET");
    }

    // Engine
    let mut engine =
        ReconciliationEngine::new(store.clone(), ledger.clone(), EngineConfig::from_env());
    let stripe_configured = stripe.is_some();
    let paypal_configured = paypal.is_some();
    if let Some(gateway) = stripe {
        engine = engine.with_stripe(gateway);
    }
    if let Some(gateway) = paypal {
        engine = engine.with_paypal(gateway);
    }
    let engine = Arc::new(engine);

    // Background sweep: re-verify pending sales the buyer walked away
    // from, releasing their reservations once the provider reports
    // the session expired
    let sweep_interval = env_seconds("SWEEP_INTERVAL_SECS", 300);
    let stale_after = env_seconds("SWEEP_STALE_AFTER_SECS", 1800);
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(sweep_interval.max(1) as u64));
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                interval.tick().await;
                match engine.sweep_stale(chrono::Duration::seconds(stale_after)).await {
                    Ok(report) if report.checked == 0 => {}
                    Ok(report) => {
                        tracing::debug!(?report, "Sweep completed");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Sweep failed");
                    }
                }
            }
        });
    }

    // Build application state
    let app_state = AppState {
        ledger,
        store,
        engine,
        stripe_webhook: stripe_webhook_parser,
        stripe_configured,
        paypal_configured,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & catalog
        .route("/health", get(health_check))
        .route("/api/sellables", get(list_sellables).post(create_sellable))
        // Checkout
        .route("/api/purchase", post(purchase))
        .route("/api/sales/{id}", get(get_sale))
        .route("/api/sales/{id}/verify", post(verify_sale))
        .route("/api/checkout/return", get(checkout_return))
        .route("/api/checkout/cancelled", get(checkout_return))
        // Webhooks
        .route("/webhook/stripe", post(stripe_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 commerce-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  GET  /api/sellables           - List catalog");
    tracing::info!("  POST /api/sellables           - Seed a sellable");
    tracing::info!("  POST /api/purchase            - Start a checkout");
    tracing::info!("  GET  /api/sales/{{id}}          - Sale status");
    tracing::info!("  POST /api/sales/{{id}}/verify   - Verify payment");
    tracing::info!("  GET  /api/checkout/return     - Provider return URL");
    tracing::info!("  POST /webhook/stripe          - Stripe webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
