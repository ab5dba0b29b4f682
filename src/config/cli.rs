use crate::config::toml_config::LookupConfig;
use crate::domain::model::{BillingType, MeterQuery};
use crate::utils::error::{LookupError, Result};
use crate::utils::validation::Validate;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "meter-lookup")]
#[command(about = "Resolve a utility meter number into customer and account details")]
pub struct CliConfig {
    /// Meter number as printed on the meter
    pub meter_number: String,

    #[arg(long = "type", default_value = "prepaid", help = "Billing type: prepaid or postpaid")]
    pub billing_type: BillingType,

    #[arg(long, default_value = "meter-lookup.toml")]
    pub config: String,

    #[arg(long, help = "Per-stage timeout in seconds (overrides the config file)")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Print the aggregated record as JSON")]
    pub json: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// Trimmed query built from the command line.
    pub fn query(&self) -> MeterQuery {
        MeterQuery::new(self.meter_number.trim(), self.billing_type)
    }

    /// Loads the endpoint configuration and applies command-line overrides.
    pub fn load_lookup_config(&self) -> Result<LookupConfig> {
        if !std::path::Path::new(&self.config).exists() {
            return Err(LookupError::MissingConfigError {
                field: format!("config file {}", self.config),
            });
        }
        let mut config = LookupConfig::from_file(&self.config)?;
        if let Some(timeout) = self.timeout {
            config.http.timeout_seconds = timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        self.query().validate()
    }
}
