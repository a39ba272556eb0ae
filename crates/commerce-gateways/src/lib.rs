//! # commerce-gateways
//!
//! Checkout session gateways for the event commerce core.
//!
//! Both providers implement the same capability set behind
//! [`CheckoutGateway`]: create a hosted checkout session for a sale,
//! then verify its payment status later.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │  Your Site  │────▶│  Provider-Hosted │────▶│  Your Site  │
//! │ (purchase)  │     │  Checkout Page   │     │  (return)   │
//! └─────────────┘     └──────────────────┘     └─────────────┘
//! ```
//!
//! ## The capture asymmetry
//!
//! Stripe's hosted checkout captures automatically on completion, so
//! its `verify` is a read. PayPal requires an explicit capture step
//! after buyer approval, so its `verify` may itself mutate
//! provider-side state (order `APPROVED` triggers a capture call).
//! The trait contract keeps this visible instead of papering over it.
//!
//! ## Error taxonomy
//!
//! Provider API failures (network, auth, malformed responses) are
//! `Err(CommerceError::Gateway(..))` and are never conflated with the
//! `Expired` or `Pending` outcomes: only a confirmed terminal outcome
//! may release inventory upstream.

pub mod gateway;
pub mod mock;
pub mod paypal;
pub mod stripe;
pub mod webhook;

pub use gateway::{CheckoutGateway, PaymentOutcome, SessionHandle, SessionRequest};
pub use mock::MockGateway;
pub use paypal::{PayPalConfig, PayPalGateway};
pub use self::stripe::StripeGateway;
pub use webhook::{StripeWebhook, StripeWebhookEvent};
