use crate::domain::model::{BillingType, MeterQuery};
use crate::utils::error::{LookupError, Result};
use url::Url;

/// Length every prepaid meter number must have.
pub const PREPAID_METER_LENGTH: usize = 12;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Caller-side input check run before a query reaches the orchestrator.
impl Validate for MeterQuery {
    fn validate(&self) -> Result<()> {
        if self.meter_number.trim().is_empty() {
            return Err(LookupError::ValidationError {
                message: "Please enter meter number".to_string(),
            });
        }

        if self.billing_type == BillingType::Prepaid
            && self.meter_number.chars().count() != PREPAID_METER_LENGTH
        {
            return Err(LookupError::ValidationError {
                message: format!("Prepaid meter must be {} digits", PREPAID_METER_LENGTH),
            });
        }

        Ok(())
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(LookupError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
