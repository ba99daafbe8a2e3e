//! Shared database service wrapper used by the API server and the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{CaseFilter, Database, LibSqlCaseRepository, LibSqlSyncLogRepository};
use crate::models::{Case, CaseDraft, NewSyncLogEntry, SyncLogEntry, SyncOverview};
use crate::sync::{CaseStore, SyncLogStore};
use crate::{CaseId, Result};

/// Number of log entries included in [`SyncOverview::recent_logs`]
pub const RECENT_LOG_LIMIT: usize = 20;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening case database at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// List cases newest-first.
    pub async fn list_cases(
        &self,
        filter: CaseFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Case>> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        repo.list(filter, limit, offset).await
    }

    /// Fetch a case by id.
    pub async fn get_case(&self, id: &CaseId) -> Result<Option<Case>> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        repo.get(id).await
    }

    /// Case ids beginning with `prefix`, for short-id lookups.
    pub async fn list_case_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        repo.list_ids_by_prefix(prefix, limit).await
    }

    /// Create a new, unsynced case.
    pub async fn create_case(&self, draft: CaseDraft) -> Result<Case> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        repo.create(draft).await
    }

    /// Replace a case's business fields and mark it for re-sync.
    pub async fn update_case(&self, id: &CaseId, draft: CaseDraft) -> Result<Case> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        repo.update(id, draft).await
    }

    /// Delete a case and its sync history, returning the removed case.
    pub async fn delete_case(&self, id: &CaseId) -> Result<Case> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        let case = repo
            .get(id)
            .await?
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))?;
        repo.delete(id).await?;
        Ok(case)
    }

    /// Cases waiting for their next sync.
    pub async fn list_unsynced_cases(&self) -> Result<Vec<Case>> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        repo.list_unsynced().await
    }

    /// Record a successful push of the case version stamped `seen_updated_at`.
    pub async fn mark_case_synced(
        &self,
        id: &CaseId,
        document_id: &str,
        seen_updated_at: i64,
    ) -> Result<Case> {
        let db = self.db.lock().await;
        let repo = LibSqlCaseRepository::new(db.connection());
        repo.mark_synced(id, document_id, seen_updated_at).await
    }

    /// Append one sync attempt to the audit log.
    pub async fn append_sync_log(&self, entry: NewSyncLogEntry) -> Result<SyncLogEntry> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncLogRepository::new(db.connection());
        repo.append(entry).await
    }

    /// Most recent sync attempts across all cases.
    pub async fn recent_sync_logs(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncLogRepository::new(db.connection());
        repo.recent(limit).await
    }

    /// Sync history of a single case.
    pub async fn list_sync_logs_for_case(&self, id: &CaseId) -> Result<Vec<SyncLogEntry>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncLogRepository::new(db.connection());
        repo.list_for_case(id).await
    }

    /// Case counts plus the latest sync attempts.
    pub async fn sync_overview(&self) -> Result<SyncOverview> {
        let db = self.db.lock().await;
        let (total, synced) = LibSqlCaseRepository::new(db.connection()).counts().await?;
        let recent_logs = LibSqlSyncLogRepository::new(db.connection())
            .recent(RECENT_LOG_LIMIT)
            .await?;

        Ok(SyncOverview {
            total,
            synced,
            pending: total.saturating_sub(synced),
            recent_logs,
        })
    }
}

#[async_trait]
impl CaseStore for DatabaseService {
    async fn get_case(&self, id: &CaseId) -> Result<Option<Case>> {
        Self::get_case(self, id).await
    }

    async fn list_unsynced_cases(&self) -> Result<Vec<Case>> {
        Self::list_unsynced_cases(self).await
    }

    async fn mark_case_synced(
        &self,
        id: &CaseId,
        document_id: &str,
        seen_updated_at: i64,
    ) -> Result<Case> {
        Self::mark_case_synced(self, id, document_id, seen_updated_at).await
    }
}

#[async_trait]
impl SyncLogStore for DatabaseService {
    async fn append_sync_log(&self, entry: NewSyncLogEntry) -> Result<SyncLogEntry> {
        Self::append_sync_log(self, entry).await
    }
}
