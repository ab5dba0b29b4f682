use crate::utils::error::{LookupError, StageError};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingType {
    Prepaid,
    Postpaid,
}

impl BillingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingType::Prepaid => "prepaid",
            BillingType::Postpaid => "postpaid",
        }
    }
}

impl fmt::Display for BillingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingType {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepaid" => Ok(BillingType::Prepaid),
            "postpaid" => Ok(BillingType::Postpaid),
            other => Err(LookupError::ValidationError {
                message: format!("Unknown billing type '{}', expected prepaid or postpaid", other),
            }),
        }
    }
}

/// One resolution request. Input checks belong to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterQuery {
    pub meter_number: String,
    pub billing_type: BillingType,
}

impl MeterQuery {
    pub fn new(meter_number: impl Into<String>, billing_type: BillingType) -> Self {
        Self {
            meter_number: meter_number.into(),
            billing_type,
        }
    }

    pub fn prepaid(meter_number: impl Into<String>) -> Self {
        Self::new(meter_number, BillingType::Prepaid)
    }

    pub fn postpaid(meter_number: impl Into<String>) -> Self {
        Self::new(meter_number, BillingType::Postpaid)
    }
}

/// The three external services, numbered the way the chain reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: prepaid meter lookup (endpoint A).
    MeterActions,
    /// Stage 2: account/customer detail (endpoint B).
    AccountDetail,
    /// Stage 3: identifier resolution (endpoint C).
    CustomerResolution,
}

impl Stage {
    pub fn number(&self) -> u8 {
        match self {
            Stage::MeterActions => 1,
            Stage::AccountDetail => 2,
            Stage::CustomerResolution => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {}", self.number())
    }
}

/// Everything learned while resolving one meter number.
///
/// Fields start absent and are only ever filled in; the orchestrator never
/// clears a field once it has been set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedRecord {
    pub meter_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_type: Option<BillingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage1_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage2_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage3_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stage_errors: Vec<StageError>,
}

impl AggregatedRecord {
    pub fn for_query(query: &MeterQuery) -> Self {
        Self {
            meter_number: query.meter_number.clone(),
            billing_type: Some(query.billing_type),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn stage_error(&self, stage: Stage) -> Option<&StageError> {
        self.stage_errors.iter().find(|e| e.stage == stage)
    }

    pub(crate) fn record_stage_error(&mut self, error: StageError) {
        self.stage_errors.push(error);
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }
}
