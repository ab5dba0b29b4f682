use crate::domain::model::{AggregatedRecord, BillingType, Stage};

const RULE: &str = "========================================";

/// Renders an `AggregatedRecord` as terminal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultPresenter {
    detailed: bool,
}

impl ResultPresenter {
    pub fn new(detailed: bool) -> Self {
        Self { detailed }
    }

    pub fn render(&self, record: &AggregatedRecord) -> String {
        if let Some(error) = &record.error {
            return format!("❌ Error: {}\n\nCheck internet connection and try again.", error);
        }

        let billing_type = record.billing_type.unwrap_or(BillingType::Postpaid);
        let mut lines = vec![
            format!("✅ {} CUSTOMER INFO", billing_type.as_str().to_uppercase()),
            RULE.to_string(),
            format!("Meter Number: {}", record.meter_number),
        ];

        if billing_type == BillingType::Prepaid {
            lines.push(format!(
                "Consumer Number: {}",
                record.consumer_number.as_deref().unwrap_or("not found")
            ));
        }

        let stages = [
            (Stage::MeterActions, record.stage1_body.is_some()),
            (Stage::CustomerResolution, record.stage3_body.is_some()),
            (Stage::AccountDetail, record.stage2_body.is_some()),
        ];
        for (stage, received) in stages {
            if let Some(line) = stage_status(record, stage, received) {
                lines.push(line);
            }
        }

        if self.detailed {
            for (title, body) in [
                ("Customer Resolution", &record.stage3_body),
                ("Account Detail", &record.stage2_body),
            ] {
                if let Some(body) = body {
                    lines.push(String::new());
                    lines.push(format!("--- {} ---", title));
                    lines.push(pretty_body(body));
                }
            }
        }

        lines.join("\n")
    }
}

fn stage_status(record: &AggregatedRecord, stage: Stage, received: bool) -> Option<String> {
    match (received, record.stage_error(stage)) {
        (true, Some(e)) => Some(format!("{}: received ({})", stage, e)),
        (true, None) => Some(format!("{}: received", stage)),
        (false, Some(e)) => Some(format!("{}: {}", stage, e)),
        (false, None) => None,
    }
}

fn pretty_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| body.to_string())
}
