//! Sync log repository implementation

use libsql::{Connection, Row, Value};

use super::{opt_text, optional_text, text};
use crate::error::{Error, Result};
use crate::models::{CaseId, NewSyncLogEntry, SyncLogEntry};
use crate::util::unix_millis_now;

/// Append-only storage for sync attempts
pub struct LibSqlSyncLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncLogRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one entry; the timestamp is assigned here
    pub async fn append(&self, entry: NewSyncLogEntry) -> Result<SyncLogEntry> {
        let now = unix_millis_now();
        self.conn
            .execute(
                "INSERT INTO sync_logs (case_id, action, status, error_message, dify_document_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                [
                    text(&entry.case_id().as_str()),
                    text(entry.action().as_str()),
                    text(entry.status().as_str()),
                    opt_text(entry.error_message()),
                    opt_text(entry.dify_document_id()),
                    Value::Integer(now),
                ],
            )
            .await?;

        let id = self.conn.last_insert_rowid();
        Ok(entry.into_entry(id, now))
    }

    /// Most recent entries across all cases, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .conn
            .query(
                "SELECT id, case_id, action, status, error_message, dify_document_id, created_at
                 FROM sync_logs
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?",
                [Value::Integer(limit)],
            )
            .await?;

        Self::collect(rows).await
    }

    /// Full history for one case, newest first
    pub async fn list_for_case(&self, case_id: &CaseId) -> Result<Vec<SyncLogEntry>> {
        let rows = self
            .conn
            .query(
                "SELECT id, case_id, action, status, error_message, dify_document_id, created_at
                 FROM sync_logs
                 WHERE case_id = ?
                 ORDER BY created_at DESC, id DESC",
                [text(&case_id.as_str())],
            )
            .await?;

        Self::collect(rows).await
    }

    async fn collect(mut rows: libsql::Rows) -> Result<Vec<SyncLogEntry>> {
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    fn parse_entry(row: &Row) -> Result<SyncLogEntry> {
        let case_id: String = row.get(1)?;
        let action: String = row.get(2)?;
        let status: String = row.get(3)?;

        Ok(SyncLogEntry {
            id: row.get(0)?,
            case_id: case_id
                .parse()
                .map_err(|_| Error::Database(format!("invalid case id `{case_id}`")))?,
            action: action.parse()?,
            status: status.parse()?,
            error_message: optional_text(row, 4)?,
            dify_document_id: optional_text(row, 5)?,
            created_at: row.get(6)?,
        })
    }
}
