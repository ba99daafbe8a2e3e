use std::path::Path;

use crate::commands::common::{format_log_lines, open_database};
use crate::error::CliError;

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let overview = db.sync_overview().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!(
        "Cases: {} total, {} synced, {} pending",
        overview.total, overview.synced, overview.pending
    );

    if overview.recent_logs.is_empty() {
        println!("No sync attempts recorded.");
        return Ok(());
    }

    println!();
    for line in format_log_lines(&overview.recent_logs) {
        println!("{line}");
    }
    Ok(())
}
