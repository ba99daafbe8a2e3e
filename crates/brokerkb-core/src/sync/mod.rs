//! One-way sync of cases into the document index.
//!
//! [`Reconciler`] pushes one case at a time and records every attempt in the
//! append-only sync log; [`Reconciler::sync_all`] drives it over the snapshot
//! of unsynced cases.

mod reconciler;

use async_trait::async_trait;
use thiserror::Error;

use crate::index::IndexError;
use crate::models::{Case, CaseId, NewSyncLogEntry, SyncLogEntry};

pub use reconciler::{Reconciler, SyncReport};

/// Case reads and writes used by the sync engine
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn get_case(&self, id: &CaseId) -> crate::Result<Option<Case>>;

    /// Every case with `is_synced == false`
    async fn list_unsynced_cases(&self) -> crate::Result<Vec<Case>>;

    /// Store `dify_document_id` and set `is_synced` in a single write.
    ///
    /// The flag is only set when the row's `updated_at` still equals
    /// `seen_updated_at`; a case edited while its push was in flight keeps
    /// the new document id but stays pending.
    async fn mark_case_synced(
        &self,
        id: &CaseId,
        document_id: &str,
        seen_updated_at: i64,
    ) -> crate::Result<Case>;
}

/// Append-only audit log of sync attempts
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn append_sync_log(&self, entry: NewSyncLogEntry) -> crate::Result<SyncLogEntry>;
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Store(#[from] crate::Error),
    #[error("Case not found: {0}")]
    NotFound(CaseId),
}
