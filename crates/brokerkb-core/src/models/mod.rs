//! Data models for brokerkb

mod case;
mod sync_log;

pub use case::{Case, CaseDraft, CaseId, CaseOutcome};
pub use sync_log::{NewSyncLogEntry, SyncAction, SyncLogEntry, SyncOverview, SyncStatus};
