pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::http::{HttpLookupService, JsonHttpClient};
pub use config::LookupConfig;
pub use self::core::{
    orchestrator::LookupOrchestrator,
    presenter::ResultPresenter,
    worker::{CancelToken, LookupHandle, LookupWorker},
};
pub use domain::model::{AggregatedRecord, BillingType, MeterQuery, Stage};
pub use utils::error::{LookupError, Result, StageError, StageErrorKind, StageResult};
