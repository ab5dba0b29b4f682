pub mod extractor;
pub mod orchestrator;
pub mod presenter;
pub mod stream_decoder;
pub mod worker;

pub use crate::domain::model::{AggregatedRecord, BillingType, MeterQuery, Stage};
pub use crate::domain::ports::LookupService;
pub use crate::utils::error::{Result, StageResult};
