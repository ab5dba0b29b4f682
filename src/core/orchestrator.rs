use crate::core::extractor::{self, normalize_field};
use crate::core::stream_decoder;
use crate::core::worker::CancelToken;
use crate::domain::model::{AggregatedRecord, BillingType, MeterQuery, Stage};
use crate::domain::ports::LookupService;
use crate::utils::error::{StageError, StageErrorKind};
use serde_json::Value;
use tracing::instrument;

/// Field carrying the resolved identifier in stage-3 responses.
const CUSTOMER_NUMBER_FIELD: &str = "customerNumber";

/// Runs the per-billing-type lookup chain and folds every stage outcome into
/// one `AggregatedRecord`.
///
/// Prepaid: stage 1 → identifier extraction → stage 3 → stage 2.
/// Postpaid: stage 3 → stage 2, keyed by the meter number.
/// Stage 2 always falls back to the identifier that was fed to stage 3 when
/// stage 3 yields no usable `customerNumber`.
pub struct LookupOrchestrator<S: LookupService> {
    service: S,
}

impl<S: LookupService> LookupOrchestrator<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn resolve(&self, query: &MeterQuery) -> AggregatedRecord {
        self.resolve_with_cancel(query, &CancelToken::new()).await
    }

    #[instrument(
        skip(self, cancel),
        fields(meter = %query.meter_number, billing = %query.billing_type)
    )]
    pub async fn resolve_with_cancel(
        &self,
        query: &MeterQuery,
        cancel: &CancelToken,
    ) -> AggregatedRecord {
        let mut record = AggregatedRecord::for_query(query);

        match query.billing_type {
            BillingType::Prepaid => self.run_prepaid(query, cancel, &mut record).await,
            BillingType::Postpaid => self.run_postpaid(query, cancel, &mut record).await,
        }

        tracing::info!(
            "🏁 Lookup finished (consumer: {}, stage3: {}, stage2: {}, errors: {})",
            record.consumer_number.as_deref().unwrap_or("-"),
            record.stage3_body.is_some(),
            record.stage2_body.is_some(),
            record.stage_errors.len()
        );
        record
    }

    async fn run_prepaid(&self, query: &MeterQuery, cancel: &CancelToken, record: &mut AggregatedRecord) {
        if Self::cancelled(cancel, Stage::MeterActions, record) {
            return;
        }

        tracing::debug!("📡 Stage 1: meter lookup for {}", query.meter_number);
        let body = match self.service.meter_actions(&query.meter_number).await {
            Ok(body) => body,
            Err(e) => {
                // Stage 1 is the only source of the consumer identifier.
                tracing::error!("❌ Stage 1 failed: {}", e);
                record.fail(e.message.clone());
                record.record_stage_error(e);
                return;
            }
        };
        record.stage1_body = Some(body.clone());

        let consumer = match Self::consumer_from_stage1(&body) {
            Ok(consumer) => consumer,
            Err(e) => {
                if e.kind == StageErrorKind::Parse {
                    record.fail(e.message.clone());
                }
                tracing::warn!("⚠️ No consumer number from stage 1: {}", e);
                record.record_stage_error(e);
                return;
            }
        };
        tracing::info!("🔎 Consumer number: {}", consumer);
        record.consumer_number = Some(consumer.clone());

        self.resolve_and_fetch(&consumer, cancel, record).await;
    }

    async fn run_postpaid(&self, query: &MeterQuery, cancel: &CancelToken, record: &mut AggregatedRecord) {
        self.resolve_and_fetch(&query.meter_number, cancel, record).await;

        if record.stage3_body.is_none() && record.stage2_body.is_none() {
            if let Some(last) = record.stage_errors.last() {
                let message = last.message.clone();
                record.fail(message);
            }
        }
    }

    /// Stage 3 then stage 2, falling back to `identifier` for stage 2.
    async fn resolve_and_fetch(&self, identifier: &str, cancel: &CancelToken, record: &mut AggregatedRecord) {
        if Self::cancelled(cancel, Stage::CustomerResolution, record) {
            return;
        }

        tracing::debug!("📡 Stage 3: resolving {}", identifier);
        let resolved = match self.service.customer_resolution(identifier).await {
            Ok(body) => {
                let number = Self::customer_number_from(&body);
                record.stage3_body = Some(body);
                number
            }
            Err(e) => Err(e),
        };

        let target = match resolved {
            Ok(number) => {
                tracing::info!("🔎 Stage 3 resolved {} -> {}", identifier, number);
                number
            }
            Err(e) => {
                tracing::warn!("⚠️ Stage 3 unusable ({}), falling back to {}", e, identifier);
                record.record_stage_error(e);
                identifier.to_string()
            }
        };

        if Self::cancelled(cancel, Stage::AccountDetail, record) {
            return;
        }

        tracing::debug!("📡 Stage 2: account detail for {}", target);
        match self.service.account_detail(&target).await {
            Ok(body) => record.stage2_body = Some(body),
            Err(e) => {
                tracing::warn!("⚠️ Stage 2 failed: {}", e);
                record.record_stage_error(e);
            }
        }
    }

    fn consumer_from_stage1(body: &str) -> Result<String, StageError> {
        let payload = stream_decoder::decode(body).ok_or_else(|| {
            StageError::new(
                Stage::MeterActions,
                StageErrorKind::Decode,
                "Stage 1 Error: response has no payload line",
            )
        })?;

        let document: Value = serde_json::from_str(payload).map_err(|e| {
            StageError::new(
                Stage::MeterActions,
                StageErrorKind::Parse,
                format!("Stage 1 Error: invalid JSON payload: {}", e),
            )
        })?;

        extractor::extract(&document).ok_or_else(|| {
            StageError::new(
                Stage::MeterActions,
                StageErrorKind::FieldMissing,
                "Stage 1 Error: consumer number not found",
            )
        })
    }

    fn customer_number_from(body: &str) -> Result<String, StageError> {
        let document: Value = serde_json::from_str(body).map_err(|e| {
            StageError::new(
                Stage::CustomerResolution,
                StageErrorKind::Parse,
                format!("Stage 3 Error: invalid JSON: {}", e),
            )
        })?;

        document
            .get(CUSTOMER_NUMBER_FIELD)
            .and_then(normalize_field)
            .ok_or_else(|| {
                StageError::new(
                    Stage::CustomerResolution,
                    StageErrorKind::FieldMissing,
                    format!("Stage 3 Error: {} missing or empty", CUSTOMER_NUMBER_FIELD),
                )
            })
    }

    fn cancelled(cancel: &CancelToken, stage: Stage, record: &mut AggregatedRecord) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        tracing::info!("🛑 Lookup cancelled before {}", stage);
        let error = StageError::cancelled(stage);
        record.fail(error.message.clone());
        record.record_stage_error(error);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::utils::error::StageResult;

    #[derive(Clone, Default)]
    struct MockLookupService {
        responses: Arc<Mutex<HashMap<(Stage, String), StageResult>>>,
        calls: Arc<Mutex<Vec<(Stage, String)>>>,
        cancel_after: Option<(Stage, CancelToken)>,
    }

    impl MockLookupService {
        fn new() -> Self {
            Self::default()
        }

        fn respond(self, stage: Stage, key: &str, result: StageResult) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert((stage, key.to_string()), result);
            self
        }

        fn calls(&self) -> Vec<(Stage, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, stage: Stage, key: &str) -> StageResult {
            self.calls.lock().unwrap().push((stage, key.to_string()));
            if let Some((after, token)) = &self.cancel_after {
                if *after == stage {
                    token.cancel();
                }
            }
            self.responses
                .lock()
                .unwrap()
                .get(&(stage, key.to_string()))
                .cloned()
                .unwrap_or_else(|| Err(StageError::http_status(stage, 404)))
        }
    }

    #[async_trait]
    impl LookupService for MockLookupService {
        async fn meter_actions(&self, meter_number: &str) -> StageResult {
            self.answer(Stage::MeterActions, meter_number)
        }

        async fn customer_resolution(&self, identifier: &str) -> StageResult {
            self.answer(Stage::CustomerResolution, identifier)
        }

        async fn account_detail(&self, identifier: &str) -> StageResult {
            self.answer(Stage::AccountDetail, identifier)
        }
    }

    const METER: &str = "123456789012";
    const STAGE1_SENTINEL_BODY: &str = r#"1:{"mCustomerData":{"result":{"customerAccountNo":"N/A"}},"mOrderData":{"result":{"orders":{"order":[{"customerNo":"CN5001"}]}}}}"#;

    #[tokio::test]
    async fn test_prepaid_full_chain() {
        let service = MockLookupService::new()
            .respond(Stage::MeterActions, METER, Ok(STAGE1_SENTINEL_BODY.to_string()))
            .respond(
                Stage::CustomerResolution,
                "CN5001",
                Ok(r#"{"customerNumber":"77001"}"#.to_string()),
            )
            .respond(Stage::AccountDetail, "77001", Ok(r#"{"balance":12.5}"#.to_string()));
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

        assert_eq!(record.consumer_number.as_deref(), Some("CN5001"));
        assert_eq!(record.stage1_body.as_deref(), Some(STAGE1_SENTINEL_BODY));
        assert_eq!(record.stage3_body.as_deref(), Some(r#"{"customerNumber":"77001"}"#));
        assert_eq!(record.stage2_body.as_deref(), Some(r#"{"balance":12.5}"#));
        assert!(record.error.is_none());
        assert!(record.stage_errors.is_empty());
        assert_eq!(
            service.calls(),
            vec![
                (Stage::MeterActions, METER.to_string()),
                (Stage::CustomerResolution, "CN5001".to_string()),
                (Stage::AccountDetail, "77001".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_prepaid_stage1_transport_failure() {
        let service = MockLookupService::new().respond(
            Stage::MeterActions,
            METER,
            Err(StageError::transport(Stage::MeterActions, "dns error")),
        );
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

        assert_eq!(record.meter_number, METER);
        assert_eq!(record.error.as_deref(), Some("Stage 1 Error: dns error"));
        assert!(record.consumer_number.is_none());
        assert!(record.stage1_body.is_none());
        assert!(record.stage2_body.is_none());
        assert!(record.stage3_body.is_none());
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_prepaid_malformed_stage1_json_stops_chain() {
        for body in ["1:", "1:{not json", "0:x\n1:[1,"] {
            let service = MockLookupService::new().respond(Stage::MeterActions, METER, Ok(body.to_string()));
            let orchestrator = LookupOrchestrator::new(service.clone());

            let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

            assert_eq!(record.stage1_body.as_deref(), Some(body));
            assert!(record.consumer_number.is_none());
            assert!(record.stage3_body.is_none());
            assert!(record.stage2_body.is_none());
            assert!(record.error.is_some());
            assert_eq!(record.stage_errors[0].kind, StageErrorKind::Parse);
            assert_eq!(service.calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_prepaid_missing_identifier_is_partial_result() {
        let body = r#"1:{"mCustomerData":{"result":{"customerAccountNo":"N/A"}}}"#;
        let service = MockLookupService::new().respond(Stage::MeterActions, METER, Ok(body.to_string()));
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

        assert_eq!(record.stage1_body.as_deref(), Some(body));
        assert!(record.consumer_number.is_none());
        assert!(record.stage3_body.is_none());
        assert!(record.stage2_body.is_none());
        assert!(record.error.is_none());
        assert_eq!(
            record.stage_error(Stage::MeterActions).map(|e| e.kind),
            Some(StageErrorKind::FieldMissing)
        );
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_prepaid_missing_payload_line_is_decode_failure() {
        let service = MockLookupService::new().respond(Stage::MeterActions, METER, Ok("0:{}".to_string()));
        let orchestrator = LookupOrchestrator::new(service);

        let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

        assert_eq!(record.stage1_body.as_deref(), Some("0:{}"));
        assert!(record.error.is_none());
        assert_eq!(record.stage_errors[0].kind, StageErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_prepaid_stage3_404_falls_back_to_consumer_number() {
        let service = MockLookupService::new()
            .respond(Stage::MeterActions, METER, Ok(STAGE1_SENTINEL_BODY.to_string()))
            .respond(Stage::AccountDetail, "CN5001", Ok(r#"{"name":"A. Customer"}"#.to_string()));
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

        assert!(record.stage3_body.is_none());
        assert_eq!(record.stage2_body.as_deref(), Some(r#"{"name":"A. Customer"}"#));
        assert_eq!(
            record.stage_error(Stage::CustomerResolution).map(|e| e.message.as_str()),
            Some("HTTP Error: 404")
        );
        assert!(record.error.is_none());
        assert_eq!(service.calls()[2], (Stage::AccountDetail, "CN5001".to_string()));
    }

    #[tokio::test]
    async fn test_prepaid_stage3_unparseable_falls_back() {
        let service = MockLookupService::new()
            .respond(Stage::MeterActions, METER, Ok(STAGE1_SENTINEL_BODY.to_string()))
            .respond(Stage::CustomerResolution, "CN5001", Ok("<html>oops</html>".to_string()))
            .respond(Stage::AccountDetail, "CN5001", Ok("{}".to_string()));
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

        assert_eq!(record.stage3_body.as_deref(), Some("<html>oops</html>"));
        assert_eq!(record.stage2_body.as_deref(), Some("{}"));
        assert_eq!(
            record.stage_error(Stage::CustomerResolution).map(|e| e.kind),
            Some(StageErrorKind::Parse)
        );
    }

    #[tokio::test]
    async fn test_stage2_failure_is_recorded_not_raised() {
        let service = MockLookupService::new()
            .respond(Stage::MeterActions, METER, Ok(STAGE1_SENTINEL_BODY.to_string()))
            .respond(
                Stage::CustomerResolution,
                "CN5001",
                Ok(r#"{"customerNumber":"77001"}"#.to_string()),
            );
        let orchestrator = LookupOrchestrator::new(service);

        let record = orchestrator.resolve(&MeterQuery::prepaid(METER)).await;

        assert!(record.stage2_body.is_none());
        assert_eq!(record.consumer_number.as_deref(), Some("CN5001"));
        assert!(record.error.is_none());
        assert_eq!(
            record.stage_error(Stage::AccountDetail).map(|e| e.message.as_str()),
            Some("HTTP Error: 404")
        );
    }

    #[tokio::test]
    async fn test_postpaid_empty_customer_number_uses_meter_number() {
        let service = MockLookupService::new()
            .respond(Stage::CustomerResolution, "METER77", Ok(r#"{"customerNumber":""}"#.to_string()))
            .respond(Stage::AccountDetail, "METER77", Ok(r#"{"ok":true}"#.to_string()));
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::postpaid("METER77")).await;

        assert_eq!(
            service.calls(),
            vec![
                (Stage::CustomerResolution, "METER77".to_string()),
                (Stage::AccountDetail, "METER77".to_string()),
            ]
        );
        assert_eq!(record.stage3_body.as_deref(), Some(r#"{"customerNumber":""}"#));
        assert_eq!(record.stage2_body.as_deref(), Some(r#"{"ok":true}"#));
        assert!(record.consumer_number.is_none());
        assert!(record.stage1_body.is_none());
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn test_postpaid_uses_resolved_customer_number() {
        let service = MockLookupService::new()
            .respond(
                Stage::CustomerResolution,
                "METER77",
                Ok(r#"{"customerNumber":{"_text":" 5500 "}}"#.to_string()),
            )
            .respond(Stage::AccountDetail, "5500", Ok("{}".to_string()));
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::postpaid("METER77")).await;

        assert_eq!(service.calls()[1], (Stage::AccountDetail, "5500".to_string()));
        assert_eq!(record.stage2_body.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_postpaid_all_stages_failed_sets_error() {
        let service = MockLookupService::new();
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator.resolve(&MeterQuery::postpaid("METER77")).await;

        assert_eq!(record.error.as_deref(), Some("HTTP Error: 404"));
        assert_eq!(record.stage_errors.len(), 2);
        assert_eq!(service.calls()[1], (Stage::AccountDetail, "METER77".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let service = MockLookupService::new();
        let orchestrator = LookupOrchestrator::new(service.clone());
        let cancel = CancelToken::new();
        cancel.cancel();

        let record = orchestrator
            .resolve_with_cancel(&MeterQuery::prepaid(METER), &cancel)
            .await;

        assert_eq!(record.error.as_deref(), Some("Lookup cancelled"));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_mid_chain_keeps_partial_data() {
        let cancel = CancelToken::new();
        let mut service = MockLookupService::new()
            .respond(Stage::MeterActions, METER, Ok(STAGE1_SENTINEL_BODY.to_string()))
            .respond(
                Stage::CustomerResolution,
                "CN5001",
                Ok(r#"{"customerNumber":"77001"}"#.to_string()),
            );
        service.cancel_after = Some((Stage::CustomerResolution, cancel.clone()));
        let orchestrator = LookupOrchestrator::new(service.clone());

        let record = orchestrator
            .resolve_with_cancel(&MeterQuery::prepaid(METER), &cancel)
            .await;

        assert_eq!(record.consumer_number.as_deref(), Some("CN5001"));
        assert!(record.stage3_body.is_some());
        assert!(record.stage2_body.is_none());
        assert_eq!(record.error.as_deref(), Some("Lookup cancelled"));
        assert_eq!(
            record.stage_error(Stage::AccountDetail).map(|e| e.kind),
            Some(StageErrorKind::Cancelled)
        );
        assert_eq!(service.calls().len(), 2);
    }
}
