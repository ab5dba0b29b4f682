use clap::Parser;
use meter_lookup::utils::logger::{self, LogFormat};
use meter_lookup::utils::validation::Validate;
use meter_lookup::{CliConfig, HttpLookupService, LookupOrchestrator, LookupWorker, ResultPresenter};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(config.verbose, format);

    tracing::info!("Starting meter-lookup");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Input validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let lookup_config = match config.load_lookup_config() {
        Ok(lookup_config) => lookup_config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let service = HttpLookupService::new(lookup_config)?;
    let orchestrator = Arc::new(LookupOrchestrator::new(service));
    let query = config.query();

    if !config.json {
        println!(
            "🔄 Fetching {} data...\nMeter: {}\n",
            query.billing_type, query.meter_number
        );
    }

    let handle = LookupWorker::spawn(orchestrator, query);

    // Ctrl-C stops the chain before its next stage.
    let token = handle.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, cancelling lookup");
            token.cancel();
        }
    });

    let record = handle.join().await;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", ResultPresenter::new(config.verbose).render(&record));
    }

    if record.is_error() {
        std::process::exit(2);
    }

    Ok(())
}
