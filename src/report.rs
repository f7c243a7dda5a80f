use crate::funnel::models::Bucket;
use crate::pipeline::{RunOutcome, StageReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Machine-readable run artifact. Everything the dashboard shows is derived
/// from this same structure, so the two artifacts cannot disagree.
#[derive(Debug, Serialize)]
pub struct MonitorReport<'a> {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: &'a str,
    pub summary: serde_json::Value,
    pub funnel: &'a crate::funnel::FunnelReport,
    pub stages: &'a [StageReport],
}

impl<'a> MonitorReport<'a> {
    pub fn from_outcome(outcome: &'a RunOutcome) -> Self {
        let report = &outcome.report;
        let summary = json!({
            "total": report.total,
            "with_supplier_stock": report.with_supplier_stock,
            "eligible": report.eligible,
            "consistent": report.consistent,
            "buckets": report.counts,
            "input_errors": report.input_errors.len(),
            "rule_gaps": report.rule_gaps.len(),
        });
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            source: &outcome.source_name,
            summary,
            funnel: report,
            stages: &outcome.stages,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)?;
        info!(target = "catmon.report", path = %path.display(), "json report written");
        Ok(())
    }
}

/// Write both run artifacts into the output directory, creating it as
/// needed. Also used for the empty fallback report when the source could
/// not be loaded.
pub fn write_artifacts(outcome: &RunOutcome, dir: &Path) -> Result<(), ReportError> {
    std::fs::create_dir_all(dir)?;
    MonitorReport::from_outcome(outcome).write_json(&dir.join("monitor-report.json"))?;
    crate::dashboard::write_html(outcome, &dir.join("monitor.html"))?;
    Ok(())
}

/// Per-bucket summary lines, mirroring the dashboard's stat grid.
pub fn log_summary(outcome: &RunOutcome) {
    let report = &outcome.report;
    for bucket in Bucket::ALL {
        info!(
            target = "catmon.report",
            bucket = bucket.name(),
            count = report.counts.get(bucket),
            "bucket total"
        );
    }
    info!(
        target = "catmon.report",
        total = report.total,
        eligible = report.eligible,
        consistent = report.consistent,
        input_errors = report.input_errors.len(),
        rule_gaps = report.rule_gaps.len(),
        "run complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::aggregate;
    use crate::funnel::models::{ClassifiedProduct, PriceListEntry};

    fn outcome() -> RunOutcome {
        let product = ClassifiedProduct {
            entry: PriceListEntry {
                catalog_id: Some("1".to_string()),
                supplier_part: "SUP-1".to_string(),
                description: "Widget".to_string(),
                vendor_name: "Acme".to_string(),
                vendor_part: "AC-1".to_string(),
                customer_price: 10.0,
                available_quantity: 2,
                creation_reason: "NORMAL".to_string(),
                category: "Widgets".to_string(),
                subcategory: "Small".to_string(),
            },
            bucket: Bucket::ReadyToPublish,
            record: None,
            failure: None,
        };
        RunOutcome {
            report: aggregate(vec![product], Vec::new(), Vec::new()),
            stages: vec![StageReport::new("classify", 1, json!({"classified": 1}))],
            source_name: "test.csv".to_string(),
        }
    }

    #[test]
    fn report_round_trips_as_json() {
        let outcome = outcome();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor-report.json");
        MonitorReport::from_outcome(&outcome)
            .write_json(&path)
            .unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["source"], "test.csv");
        assert_eq!(parsed["summary"]["eligible"], 1);
        assert_eq!(parsed["summary"]["consistent"], true);
        assert_eq!(parsed["funnel"]["counts"]["ready_to_publish"], 1);
        assert_eq!(parsed["stages"][0]["name"], "classify");
    }
}
