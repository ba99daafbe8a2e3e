//! Case repository implementation

use libsql::{Connection, Row, Value};

use super::{opt_int, opt_text, optional_int, optional_text, text};
use crate::error::{Error, Result};
use crate::models::{Case, CaseDraft, CaseId};
use crate::util::unix_millis_now;

const CASE_COLUMNS: &str = "id, title, loan_type, amount, applicant_profile, lender, outcome, \
     key_factors, notes, dify_document_id, is_synced, created_at, updated_at";

/// Filter applied when listing cases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaseFilter {
    /// Restrict to synced (`Some(true)`) or unsynced (`Some(false)`) cases
    pub synced: Option<bool>,
}

/// libSQL-backed case storage
pub struct LibSqlCaseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCaseRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new case built from the draft
    pub async fn create(&self, draft: CaseDraft) -> Result<Case> {
        let case = Case::new(draft)?;
        self.insert(&case).await?;
        Ok(case)
    }

    /// Insert a fully-formed case, keeping its id and sync fields
    pub async fn insert(&self, case: &Case) -> Result<()> {
        let key_factors = serde_json::to_string(&case.key_factors)?;
        self.conn
            .execute(
                "INSERT INTO cases (id, title, loan_type, amount, applicant_profile, lender, outcome,
                                    key_factors, notes, dify_document_id, is_synced, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                [
                    text(&case.id.as_str()),
                    text(&case.title),
                    text(&case.loan_type),
                    opt_int(case.amount),
                    text(&case.applicant_profile),
                    opt_text(case.lender.as_deref()),
                    text(case.outcome.as_str()),
                    Value::Text(key_factors),
                    text(&case.notes),
                    opt_text(case.dify_document_id.as_deref()),
                    Value::Integer(i64::from(case.is_synced)),
                    Value::Integer(case.created_at),
                    Value::Integer(case.updated_at),
                ],
            )
            .await?;
        Ok(())
    }

    /// Get a case by ID
    pub async fn get(&self, id: &CaseId) -> Result<Option<Case>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?"),
                [text(&id.as_str())],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_case(&row)?)),
            None => Ok(None),
        }
    }

    /// Ids starting with `prefix`, at most `limit` of them
    pub async fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(Vec::new());
        }

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM cases WHERE id LIKE ? ORDER BY id LIMIT ?",
                [
                    Value::Text(format!("{}%", prefix.to_ascii_lowercase())),
                    Value::Integer(limit),
                ],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    /// List cases newest-first, optionally filtered by sync state
    pub async fn list(&self, filter: CaseFilter, limit: usize, offset: usize) -> Result<Vec<Case>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows = match filter.synced {
            Some(synced) => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {CASE_COLUMNS} FROM cases WHERE is_synced = ?
                             ORDER BY updated_at DESC LIMIT ? OFFSET ?"
                        ),
                        [
                            Value::Integer(i64::from(synced)),
                            Value::Integer(limit),
                            Value::Integer(offset),
                        ],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {CASE_COLUMNS} FROM cases
                             ORDER BY updated_at DESC LIMIT ? OFFSET ?"
                        ),
                        [Value::Integer(limit), Value::Integer(offset)],
                    )
                    .await?
            }
        };

        Self::collect(rows).await
    }

    /// Every case whose latest sync has not succeeded, oldest edit first
    pub async fn list_unsynced(&self) -> Result<Vec<Case>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CASE_COLUMNS} FROM cases WHERE is_synced = 0 ORDER BY updated_at ASC"
                ),
                (),
            )
            .await?;

        Self::collect(rows).await
    }

    /// Replace a case's business fields.
    ///
    /// The case becomes unsynced; its document id is kept so the next sync
    /// updates the existing document instead of creating another.
    pub async fn update(&self, id: &CaseId, draft: CaseDraft) -> Result<Case> {
        let draft = draft.normalized()?;
        let key_factors = serde_json::to_string(&draft.key_factors)?;
        let now = unix_millis_now();

        let rows = self
            .conn
            .execute(
                "UPDATE cases SET title = ?, loan_type = ?, amount = ?, applicant_profile = ?,
                                  lender = ?, outcome = ?, key_factors = ?, notes = ?,
                                  is_synced = 0, updated_at = MAX(?, updated_at + 1)
                 WHERE id = ?",
                [
                    text(&draft.title),
                    text(&draft.loan_type),
                    opt_int(draft.amount),
                    text(&draft.applicant_profile),
                    opt_text(draft.lender.as_deref()),
                    text(draft.outcome.as_str()),
                    Value::Text(key_factors),
                    text(&draft.notes),
                    Value::Integer(now),
                    text(&id.as_str()),
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get(id).await?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Store the document id and set the synced flag in one statement.
    ///
    /// The flag is only raised if the row is unchanged since `seen_updated_at`.
    pub async fn mark_synced(
        &self,
        id: &CaseId,
        document_id: &str,
        seen_updated_at: i64,
    ) -> Result<Case> {
        let rows = self
            .conn
            .execute(
                "UPDATE cases SET dify_document_id = ?, is_synced = (updated_at = ?) WHERE id = ?",
                [
                    text(document_id),
                    Value::Integer(seen_updated_at),
                    text(&id.as_str()),
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get(id).await?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Delete a case and, through the foreign key, its sync log
    pub async fn delete(&self, id: &CaseId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM cases WHERE id = ?", [text(&id.as_str())])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    /// Count `(total, synced)` cases
    pub async fn counts(&self) -> Result<(usize, usize)> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(is_synced), 0) FROM cases",
                (),
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok((0, 0));
        };
        let total = usize::try_from(row.get::<i64>(0)?).unwrap_or_default();
        let synced = usize::try_from(row.get::<i64>(1)?).unwrap_or_default();
        Ok((total, synced))
    }

    async fn collect(mut rows: libsql::Rows) -> Result<Vec<Case>> {
        let mut cases = Vec::new();
        while let Some(row) = rows.next().await? {
            cases.push(Self::parse_case(&row)?);
        }
        Ok(cases)
    }

    /// Parse a case from a database row
    fn parse_case(row: &Row) -> Result<Case> {
        let id: String = row.get(0)?;
        let outcome: String = row.get(6)?;
        let key_factors: String = row.get(7)?;

        Ok(Case {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid case id `{id}`")))?,
            title: row.get(1)?,
            loan_type: row.get(2)?,
            amount: optional_int(row, 3)?,
            applicant_profile: row.get(4)?,
            lender: optional_text(row, 5)?,
            outcome: outcome.parse()?,
            key_factors: serde_json::from_str(&key_factors)?,
            notes: row.get(8)?,
            dify_document_id: optional_text(row, 9)?,
            is_synced: row.get::<i64>(10)? != 0,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}
