//! Stripe Webhook Handling
//!
//! Verifies webhook signatures and maps checkout-session events to
//! the session ids the reconciliation engine can act on. A webhook is
//! only a verification trigger: settlement always goes back through
//! the engine's `verify_payment`, so a webhook racing a poll resolves
//! on the sale store's compare-and-swap, not here.

use stripe::{EventObject, EventType, Webhook};

use commerce_core::error::{CommerceError, Result};

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StripeWebhookEvent {
    /// Buyer finished the hosted checkout; verify the session
    CheckoutCompleted { session_id: String },

    /// The session timed out on Stripe's schedule; verify (and let
    /// the engine settle the failure and release inventory)
    CheckoutExpired { session_id: String },

    /// Unhandled event type
    Other { event_type: String },
}

/// Stripe webhook verifier/parser
pub struct StripeWebhook {
    secret: String,
}

impl StripeWebhook {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Create from environment variables (`STRIPE_WEBHOOK_SECRET`)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| CommerceError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;
        Ok(Self::new(secret))
    }

    /// Verify the signature and extract the event
    pub fn parse(&self, payload: &str, signature: &str) -> Result<StripeWebhookEvent> {
        let event = Webhook::construct_event(payload, signature, &self.secret)
            .map_err(|e| CommerceError::WebhookSignature(e.to_string()))?;

        tracing::debug!(event_type = ?event.type_, "Received Stripe webhook");

        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    Ok(StripeWebhookEvent::CheckoutCompleted {
                        session_id: session.id.to_string(),
                    })
                } else {
                    Err(CommerceError::WebhookParse(
                        "checkout.session.completed without session data".into(),
                    ))
                }
            }
            EventType::CheckoutSessionExpired => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    Ok(StripeWebhookEvent::CheckoutExpired {
                        session_id: session.id.to_string(),
                    })
                } else {
                    Err(CommerceError::WebhookParse(
                        "checkout.session.expired without session data".into(),
                    ))
                }
            }
            other => Ok(StripeWebhookEvent::Other {
                event_type: format!("{other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_signature_rejected() {
        let webhook = StripeWebhook::new("whsec_test");
        let result = webhook.parse("{}", "t=1,v1=deadbeef");
        assert!(matches!(result, Err(CommerceError::WebhookSignature(_))));
    }
}
