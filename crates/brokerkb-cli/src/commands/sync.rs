use std::path::Path;

use brokerkb_core::sync::SyncReport;

use crate::commands::common::open_reconciler_from_env;
use crate::error::CliError;

pub async fn run_sync(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let reconciler = open_reconciler_from_env(db_path).await?;
    let report = reconciler.sync_all().await?;
    tracing::info!(
        total = report.total,
        synced = report.synced,
        failed = report.failed,
        skipped = report.skipped,
        "Sync run finished"
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }

    if report.failed > 0 {
        return Err(CliError::SyncIncomplete {
            failed: report.failed,
            total: report.total,
        });
    }
    Ok(())
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    if report.total == 0 {
        return vec!["No cases to sync".to_string()];
    }

    let mut lines = vec![format!(
        "Synced {} of {} case(s); {} failed, {} skipped",
        report.synced, report.total, report.failed, report.skipped
    )];
    lines.extend(report.errors.iter().map(|error| format!("  {error}")));
    lines
}
