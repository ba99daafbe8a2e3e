//! Sync audit log model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::CaseId;
use crate::error::{Error, Result};

/// Which index operation a sync attempt used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
}

impl SyncAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl FromStr for SyncAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            other => Err(Error::Database(format!("unknown sync action `{other}`"))),
        }
    }
}

/// Outcome of a sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Database(format!("unknown sync status `{other}`"))),
        }
    }
}

/// A stored, immutable record of one sync attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Log row identifier
    pub id: i64,
    /// Case the attempt was made for
    pub case_id: CaseId,
    pub action: SyncAction,
    pub status: SyncStatus,
    /// Set only for failed attempts
    pub error_message: Option<String>,
    /// Set only for successful attempts
    pub dify_document_id: Option<String>,
    /// Insert timestamp (Unix ms)
    pub created_at: i64,
}

/// A log entry waiting to be appended.
///
/// Fields are private so an entry can only be built through [`Self::success`]
/// or [`Self::failure`], which keep the error/document fields exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncLogEntry {
    case_id: CaseId,
    action: SyncAction,
    status: SyncStatus,
    error_message: Option<String>,
    dify_document_id: Option<String>,
}

impl NewSyncLogEntry {
    pub fn success(case_id: CaseId, action: SyncAction, document_id: impl Into<String>) -> Self {
        Self {
            case_id,
            action,
            status: SyncStatus::Success,
            error_message: None,
            dify_document_id: Some(document_id.into()),
        }
    }

    pub fn failure(case_id: CaseId, action: SyncAction, error_message: impl Into<String>) -> Self {
        Self {
            case_id,
            action,
            status: SyncStatus::Failed,
            error_message: Some(error_message.into()),
            dify_document_id: None,
        }
    }

    pub const fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub const fn action(&self) -> SyncAction {
        self.action
    }

    pub const fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn dify_document_id(&self) -> Option<&str> {
        self.dify_document_id.as_deref()
    }

    /// Materialize the stored form once the store has assigned `id` and `created_at`.
    #[must_use]
    pub fn into_entry(self, id: i64, created_at: i64) -> SyncLogEntry {
        SyncLogEntry {
            id,
            case_id: self.case_id,
            action: self.action,
            status: self.status,
            error_message: self.error_message,
            dify_document_id: self.dify_document_id,
            created_at,
        }
    }
}

/// Aggregate sync state for the status view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOverview {
    pub total: usize,
    pub synced: usize,
    pub pending: usize,
    pub recent_logs: Vec<SyncLogEntry>,
}
