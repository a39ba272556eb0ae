//! Post-Purchase Artifacts
//!
//! On completion the engine hands the sale id to an artifact
//! generator (ticket PDF, QR code, booth credentials). The call is
//! fire-and-forget from the engine's perspective: a generator failure
//! is logged and never rolls back the payment confirmation.

use async_trait::async_trait;

use commerce_core::error::Result;
use commerce_core::model::SaleId;

/// Downstream collaborator invoked once per completed sale, by id only
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, sale_id: &SaleId) -> Result<()>;
}

/// Generator that only logs (production wiring without a generator,
/// and the default for tests that don't count invocations)
pub struct NoopArtifactGenerator;

#[async_trait]
impl ArtifactGenerator for NoopArtifactGenerator {
    async fn generate(&self, sale_id: &SaleId) -> Result<()> {
        tracing::debug!(sale_id = %sale_id, "No artifact generator configured");
        Ok(())
    }
}
