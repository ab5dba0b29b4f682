use crate::utils::error::StageResult;
use async_trait::async_trait;

/// The three external lookups the orchestrator chains together.
///
/// Implementations never fail outside of the returned `StageResult`.
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Stage 1 (endpoint A): prepaid meter lookup, returns the streamed-line body.
    async fn meter_actions(&self, meter_number: &str) -> StageResult;

    /// Stage 3 (endpoint C): resolves an identifier to a customer number.
    async fn customer_resolution(&self, identifier: &str) -> StageResult;

    /// Stage 2 (endpoint B): account and billing detail.
    async fn account_detail(&self, identifier: &str) -> StageResult;
}
