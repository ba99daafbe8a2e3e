//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: cases table
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS cases (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            loan_type TEXT NOT NULL DEFAULT '',
            amount INTEGER,
            applicant_profile TEXT NOT NULL DEFAULT '',
            lender TEXT,
            outcome TEXT NOT NULL DEFAULT 'pending',
            key_factors TEXT NOT NULL DEFAULT '[]',
            notes TEXT NOT NULL DEFAULT '',
            dify_document_id TEXT,
            is_synced INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_cases_updated ON cases(updated_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_cases_synced ON cases(is_synced)",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: append-only sync audit log
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS sync_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            case_id TEXT NOT NULL REFERENCES cases(id) ON DELETE CASCADE,
            action TEXT NOT NULL CHECK (action IN ('create', 'update')),
            status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
            error_message TEXT,
            dify_document_id TEXT,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_logs_case_id ON sync_logs(case_id)",
        "CREATE INDEX IF NOT EXISTS idx_sync_logs_created_at ON sync_logs(created_at DESC)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

/// Run statements inside one transaction, rolling back on the first failure
async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}
