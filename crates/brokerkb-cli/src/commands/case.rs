use std::path::Path;

use brokerkb_core::db::CaseFilter;
use brokerkb_core::export::{render_case_markdown, suggested_export_file_name};
use brokerkb_core::models::SyncLogEntry;
use brokerkb_core::Case;
use serde::Serialize;

use crate::cli::SyncStateFilter;
use crate::commands::common::{
    case_to_list_item, format_case_lines, format_log_lines, format_timestamp, open_database,
    open_reconciler_from_env, resolve_case, sync_state_label, CaseListItem,
};
use crate::error::CliError;

pub async fn run_case_sync(id: &str, db_path: &Path) -> Result<(), CliError> {
    let reconciler = open_reconciler_from_env(db_path).await?;
    let case = resolve_case(id, reconciler.store()).await?;
    tracing::debug!(case_id = %case.id, "Resolved case for sync");

    let synced = reconciler.sync_case(&case.id).await?;
    println!(
        "{}  {}",
        synced.id,
        synced.dify_document_id.as_deref().unwrap_or_default()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct CaseDetail<'a> {
    case: &'a Case,
    sync_logs: &'a [SyncLogEntry],
}

pub async fn run_case_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let case = resolve_case(id, &db).await?;
    let logs = db.list_sync_logs_for_case(&case.id).await?;

    if as_json {
        let detail = CaseDetail {
            case: &case,
            sync_logs: &logs,
        };
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    for line in format_case_detail(&case) {
        println!("{line}");
    }
    println!();
    if logs.is_empty() {
        println!("No sync attempts recorded.");
    } else {
        for line in format_log_lines(&logs) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_case_list(
    limit: usize,
    state: Option<SyncStateFilter>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let filter = CaseFilter {
        synced: state.map(SyncStateFilter::is_synced),
    };
    let cases = db.list_cases(filter, limit, 0).await?;

    if as_json {
        let json_items = cases
            .iter()
            .map(case_to_list_item)
            .collect::<Vec<CaseListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_case_lines(&cases) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_case_export(
    id: &str,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let case = resolve_case(id, &db).await?;
    let rendered = render_case_markdown(&case);

    if let Some(path) = output_path {
        let path = if path.is_dir() {
            path.join(suggested_export_file_name(&case))
        } else {
            path.to_path_buf()
        };
        std::fs::write(&path, rendered)?;
        tracing::debug!(case_id = %case.id, path = %path.display(), "Exported case");
        println!("{}", path.display());
    } else {
        print!("{rendered}");
    }
    Ok(())
}

pub fn format_case_detail(case: &Case) -> Vec<String> {
    let state = match case.dify_document_id.as_deref() {
        Some(document_id) => format!("{} (document {document_id})", sync_state_label(case)),
        None => sync_state_label(case).to_string(),
    };

    vec![
        case.title.clone(),
        format!("  id:       {}", case.id),
        format!("  outcome:  {}", case.outcome.label()),
        format!("  sync:     {state}"),
        format!("  updated:  {}", format_timestamp(case.updated_at)),
    ]
}
