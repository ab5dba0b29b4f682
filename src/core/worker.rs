use crate::core::orchestrator::LookupOrchestrator;
use crate::domain::model::{AggregatedRecord, MeterQuery};
use crate::domain::ports::LookupService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Cooperative cancellation flag shared between a caller and one running chain.
///
/// The chain checks it before starting each stage; an in-flight request is
/// allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs each resolution on its own task. Workers share nothing mutable.
pub struct LookupWorker;

impl LookupWorker {
    pub fn spawn<S>(orchestrator: Arc<LookupOrchestrator<S>>, query: MeterQuery) -> LookupHandle
    where
        S: LookupService + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let meter_number = query.meter_number.clone();

        let handle = tokio::spawn(async move {
            orchestrator.resolve_with_cancel(&query, &token).await
        });

        LookupHandle {
            meter_number,
            cancel,
            handle,
        }
    }
}

pub struct LookupHandle {
    meter_number: String,
    cancel: CancelToken,
    handle: JoinHandle<AggregatedRecord>,
}

impl LookupHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for the chain. A task that died still yields a record, with `error` set.
    pub async fn join(self) -> AggregatedRecord {
        match self.handle.await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("❌ Lookup worker for {} failed: {}", self.meter_number, e);
                AggregatedRecord {
                    meter_number: self.meter_number,
                    error: Some(format!("Lookup worker failed: {}", e)),
                    ..Default::default()
                }
            }
        }
    }
}
