use crate::domain::model::Stage;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {message}")]
    ValidationError { message: String },
}

impl LookupError {
    pub fn user_friendly_message(&self) -> String {
        match self {
            LookupError::IoError(e) => format!("Could not read a required file: {}", e),
            LookupError::TomlError(_) | LookupError::MissingConfigError { .. } => {
                format!("The configuration file is not usable: {}", self)
            }
            LookupError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
            LookupError::ValidationError { message } => message.clone(),
            LookupError::SerializationError(e) => format!("Could not render the result: {}", e),
            LookupError::HttpClientError(e) => format!("Could not set up the HTTP client: {}", e),
        }
    }
}

impl LookupError {
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LookupError::IoError(_) | LookupError::MissingConfigError { .. } => {
                "Pass --config with the path of an existing endpoint configuration file"
            }
            LookupError::TomlError(_) | LookupError::InvalidConfigValueError { .. } => {
                "Check the [endpoints] and [http] sections of the configuration file"
            }
            LookupError::ValidationError { .. } => {
                "Check the meter number and billing type and try again"
            }
            LookupError::SerializationError(_) | LookupError::HttpClientError(_) => {
                "Run again with --verbose for details"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LookupError>;

/// Failure categories for a single external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    Transport,
    HttpStatus,
    Decode,
    Parse,
    FieldMissing,
    /// The request could not be built, e.g. an identifier unusable in a URL path.
    InvalidRequest,
    Cancelled,
}

/// A stage failure captured as data. Displays as its message only.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct StageError {
    pub stage: Stage,
    pub kind: StageErrorKind,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn transport(stage: Stage, detail: impl std::fmt::Display) -> Self {
        Self::new(
            stage,
            StageErrorKind::Transport,
            format!("{} Error: {}", stage, detail),
        )
    }

    pub fn http_status(stage: Stage, status: u16) -> Self {
        Self::new(
            stage,
            StageErrorKind::HttpStatus,
            format!("HTTP Error: {}", status),
        )
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self::new(stage, StageErrorKind::Cancelled, "Lookup cancelled")
    }
}

/// Outcome of one external call: the raw body, or why there is none.
pub type StageResult = std::result::Result<String, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message() {
        let err = StageError::http_status(Stage::CustomerResolution, 404);
        assert_eq!(err.to_string(), "HTTP Error: 404");
        assert_eq!(err.kind, StageErrorKind::HttpStatus);
    }

    #[test]
    fn test_transport_message_names_stage() {
        let err = StageError::transport(Stage::MeterActions, "connection refused");
        assert_eq!(err.to_string(), "Stage 1 Error: connection refused");
        assert_eq!(err.stage, Stage::MeterActions);
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = LookupError::ValidationError {
            message: "Prepaid meter must be 12 digits".to_string(),
        };
        assert_eq!(err.user_friendly_message(), "Prepaid meter must be 12 digits");
    }
}
