//! Mock Checkout Gateway
//!
//! For engine tests and demos: create calls hand out deterministic
//! session handles, verify calls replay a scripted outcome queue.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use commerce_core::error::{CommerceError, Result};

use crate::gateway::{CheckoutGateway, PaymentOutcome, SessionHandle, SessionRequest};

/// A scripted reply for a verify call
#[derive(Clone, Debug)]
enum ScriptedVerify {
    Outcome(PaymentOutcome),
    Error(String),
}

/// Scriptable mock gateway
pub struct MockGateway {
    name: String,
    create_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    fail_create: Mutex<Option<String>>,
    verify_script: Mutex<VecDeque<ScriptedVerify>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            name: "mock".into(),
            create_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            fail_create: Mutex::new(None),
            verify_script: Mutex::new(VecDeque::new()),
        }
    }

    /// Make every subsequent create call fail with a gateway error
    pub fn fail_create(&self, message: impl Into<String>) {
        *self.fail_create.lock().unwrap() = Some(message.into());
    }

    /// Queue an outcome for the next verify call
    pub fn push_outcome(&self, outcome: PaymentOutcome) {
        self.verify_script
            .lock()
            .unwrap()
            .push_back(ScriptedVerify::Outcome(outcome));
    }

    /// Queue a gateway error for the next verify call
    pub fn push_verify_error(&self, message: impl Into<String>) {
        self.verify_script
            .lock()
            .unwrap()
            .push_back(ScriptedVerify::Error(message.into()));
    }

    /// Number of create calls observed
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of verify calls observed
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckoutGateway for MockGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<SessionHandle> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.fail_create.lock().unwrap().clone() {
            return Err(CommerceError::Gateway(message));
        }

        Ok(SessionHandle {
            provider_session_id: format!("mock_cs_{}_{call}", request.sale_id),
            checkout_url: format!("https://checkout.mock/{}", request.sale_id),
        })
    }

    async fn verify(&self, _provider_session_id: &str) -> Result<PaymentOutcome> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        // An empty script means "nothing has changed yet"
        match self.verify_script.lock().unwrap().pop_front() {
            Some(ScriptedVerify::Outcome(outcome)) => Ok(outcome),
            Some(ScriptedVerify::Error(message)) => Err(CommerceError::Gateway(message)),
            None => Ok(PaymentOutcome::Pending),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::model::{ProviderCapture, SaleId};
    use rust_decimal_macros::dec;

    fn request() -> SessionRequest {
        SessionRequest {
            sale_id: SaleId::generate(),
            item_name: "Ticket".into(),
            item_description: None,
            unit_price: dec!(10.00),
            quantity: 1,
            customer_email: "fan@example.com".into(),
            success_url: "https://example.com/success".into(),
            cancel_url: "https://example.com/cancel".into(),
        }
    }

    #[tokio::test]
    async fn test_scripted_outcomes_replay_in_order() {
        let gateway = MockGateway::new();
        gateway.push_outcome(PaymentOutcome::Pending);
        gateway.push_outcome(PaymentOutcome::Paid(ProviderCapture::default()));

        let handle = gateway.create_session(&request()).await.unwrap();

        assert_eq!(
            gateway.verify(&handle.provider_session_id).await.unwrap(),
            PaymentOutcome::Pending
        );
        assert_eq!(
            gateway.verify(&handle.provider_session_id).await.unwrap(),
            PaymentOutcome::Paid(ProviderCapture::default())
        );
        // Exhausted script falls back to pending
        assert_eq!(
            gateway.verify(&handle.provider_session_id).await.unwrap(),
            PaymentOutcome::Pending
        );
        assert_eq!(gateway.verify_calls(), 3);
    }

    #[tokio::test]
    async fn test_create_failure_mode() {
        let gateway = MockGateway::new();
        gateway.fail_create("provider down");

        let err = gateway.create_session(&request()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Gateway(_)));
    }
}
