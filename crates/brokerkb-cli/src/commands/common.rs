use std::path::{Path, PathBuf};
use std::sync::Arc;

use brokerkb_core::config::{db_path_from_lookup, env_snapshot, DifyConfig};
use brokerkb_core::index::DifyClient;
use brokerkb_core::models::{SyncLogEntry, SyncStatus};
use brokerkb_core::services::DatabaseService;
use brokerkb_core::sync::Reconciler;
use brokerkb_core::{Case, CaseId};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct CaseListItem {
    pub id: String,
    pub title: String,
    pub loan_type: String,
    pub outcome: String,
    pub is_synced: bool,
    pub dify_document_id: Option<String>,
    pub updated_at: i64,
    pub updated_at_iso: String,
}

pub fn resolve_db_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        let values = env_snapshot();
        PathBuf::from(db_path_from_lookup(|name| values.get(name).cloned()))
    })
}

pub async fn open_database(db_path: &Path) -> Result<DatabaseService, CliError> {
    tracing::debug!(db_path = %db_path.display(), "Opening case database");
    Ok(DatabaseService::open_path(db_path).await?)
}

/// Build a reconciler from `DIFY_*` settings in the process environment.
pub async fn open_reconciler_from_env(
    db_path: &Path,
) -> Result<Reconciler<DatabaseService>, CliError> {
    let values = env_snapshot();
    open_reconciler(|name| values.get(name).cloned(), db_path).await
}

/// Resolve the Dify settings, then open the database.
///
/// Missing or invalid settings fail before the database file is created.
pub async fn open_reconciler(
    lookup: impl Fn(&str) -> Option<String>,
    db_path: &Path,
) -> Result<Reconciler<DatabaseService>, CliError> {
    let config = DifyConfig::from_lookup(lookup)?.ok_or(CliError::SyncNotConfigured)?;
    tracing::info!(
        api_url = %config.api_url,
        dataset_id = %config.dataset_id,
        "Dify sync enabled"
    );
    let client = DifyClient::new(config)?;
    let db = open_database(db_path).await?;
    Ok(Reconciler::new(db, Arc::new(client)))
}

pub async fn resolve_case(case_query: &str, db: &DatabaseService) -> Result<Case, CliError> {
    let case_query = normalize_case_identifier(case_query)?;

    if let Ok(case_id) = case_query.parse::<CaseId>() {
        if let Some(case) = db.get_case(&case_id).await? {
            return Ok(case);
        }
    }

    let matching_ids = db.list_case_ids_by_prefix(&case_query, 3).await?;

    match matching_ids.as_slice() {
        [] => Err(CliError::CaseNotFound(case_query)),
        [only] => {
            let resolved_id = only
                .parse::<CaseId>()
                .map_err(|_| CliError::CaseNotFound(case_query.clone()))?;
            db.get_case(&resolved_id)
                .await?
                .ok_or(CliError::CaseNotFound(case_query))
        }
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| id.chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousCaseId(format!(
                "ID prefix '{case_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_case_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCaseId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn case_to_list_item(case: &Case) -> CaseListItem {
    CaseListItem {
        id: case.id.to_string(),
        title: case.title.clone(),
        loan_type: case.loan_type.clone(),
        outcome: case.outcome.as_str().to_string(),
        is_synced: case.is_synced,
        dify_document_id: case.dify_document_id.clone(),
        updated_at: case.updated_at,
        updated_at_iso: format_timestamp(case.updated_at),
    }
}

pub fn format_case_lines(cases: &[Case]) -> Vec<String> {
    cases
        .iter()
        .map(|case| {
            let short_id = case.id.as_str().chars().take(13).collect::<String>();
            let state = sync_state_label(case);
            let title = truncate(&case.title, 40);
            format!(
                "{short_id:<13}  {state:<7}  {:<8}  {title}",
                case.outcome.as_str()
            )
        })
        .collect()
}

pub fn format_log_lines(entries: &[SyncLogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let detail = match entry.status {
                SyncStatus::Success => entry.dify_document_id.as_deref().unwrap_or_default(),
                SyncStatus::Failed => entry.error_message.as_deref().unwrap_or_default(),
            };
            format!(
                "{}  {:<6}  {:<7}  case={}  {detail}",
                format_timestamp(entry.created_at),
                entry.action.as_str(),
                entry.status.as_str(),
                entry.case_id,
            )
        })
        .collect()
}

pub const fn sync_state_label(case: &Case) -> &'static str {
    if case.is_synced {
        "synced"
    } else {
        "pending"
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
