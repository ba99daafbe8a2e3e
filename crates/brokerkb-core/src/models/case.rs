//! Case model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::{normalize_text_option, unix_millis_now};

/// A unique identifier for a case, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseId(Uuid);

impl CaseId {
    /// Create a new unique case ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CaseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Final decision recorded for a loan application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseOutcome {
    Approved,
    Rejected,
    #[default]
    Pending,
}

impl CaseOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Pending => "pending",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Pending => "Pending",
        }
    }
}

impl FromStr for CaseOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "pending" => Ok(Self::Pending),
            other => Err(Error::InvalidInput(format!("unknown case outcome `{other}`"))),
        }
    }
}

/// An anonymised loan application kept in the knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Unique identifier
    pub id: CaseId,
    /// Short headline shown in lists and used as the document name
    pub title: String,
    /// Loan product, e.g. "mortgage" or "business credit line"
    pub loan_type: String,
    /// Requested amount in whole currency units
    pub amount: Option<i64>,
    /// Free-text description of the applicant's situation
    pub applicant_profile: String,
    /// Lender the application was submitted to
    pub lender: Option<String>,
    pub outcome: CaseOutcome,
    /// Factors that decided the outcome
    pub key_factors: Vec<String>,
    pub notes: String,
    /// Identifier of the indexed document, once created
    pub dify_document_id: Option<String>,
    /// True iff the latest sync attempt succeeded
    pub is_synced: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

/// Editable business fields of a case
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDraft {
    pub title: String,
    #[serde(default)]
    pub loan_type: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub applicant_profile: String,
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub outcome: CaseOutcome,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl CaseDraft {
    /// Trim every field and reject drafts that cannot become a case.
    pub fn normalized(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("case title cannot be empty".into()));
        }
        if self.amount.is_some_and(|amount| amount < 0) {
            return Err(Error::InvalidInput("case amount cannot be negative".into()));
        }

        Ok(Self {
            title,
            loan_type: self.loan_type.trim().to_string(),
            amount: self.amount,
            applicant_profile: self.applicant_profile.trim().to_string(),
            lender: normalize_text_option(self.lender),
            outcome: self.outcome,
            key_factors: self
                .key_factors
                .into_iter()
                .filter_map(|factor| normalize_text_option(Some(factor)))
                .collect(),
            notes: self.notes.trim().to_string(),
        })
    }
}

impl Case {
    /// Create a new, never-synced case from a validated draft
    pub fn new(draft: CaseDraft) -> Result<Self> {
        let draft = draft.normalized()?;
        let now = unix_millis_now();
        Ok(Self {
            id: CaseId::new(),
            title: draft.title,
            loan_type: draft.loan_type,
            amount: draft.amount,
            applicant_profile: draft.applicant_profile,
            lender: draft.lender,
            outcome: draft.outcome,
            key_factors: draft.key_factors,
            notes: draft.notes,
            dify_document_id: None,
            is_synced: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the next sync will update an existing document
    #[must_use]
    pub const fn has_document(&self) -> bool {
        self.dify_document_id.is_some()
    }
}
