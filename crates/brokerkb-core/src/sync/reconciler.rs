//! Create-or-update reconciliation of cases against the document index.

use std::sync::Arc;

use serde::Serialize;

use super::{CaseStore, SyncError, SyncLogStore};
use crate::export::{case_document_name, render_case_markdown};
use crate::index::{DocumentIndex, IndexedDocument};
use crate::models::{Case, CaseId, NewSyncLogEntry, SyncAction};

/// Aggregate result of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Size of the unsynced snapshot the run started from
    pub total: usize,
    pub synced: usize,
    pub failed: usize,
    /// Snapshot entries that were deleted or synced elsewhere before their turn
    pub skipped: usize,
    /// One `"{case_id}: {message}"` line per failure
    pub errors: Vec<String>,
}

/// Pushes cases to the document index and records the outcome of every attempt.
#[derive(Clone)]
pub struct Reconciler<S> {
    store: S,
    index: Arc<dyn DocumentIndex>,
}

impl<S> Reconciler<S>
where
    S: CaseStore + SyncLogStore,
{
    pub fn new(store: S, index: Arc<dyn DocumentIndex>) -> Self {
        Self { store, index }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile one fully-loaded case and return its document id.
    ///
    /// The case is either updated with both the document id and the synced
    /// flag, or left untouched. A case edited after `case` was read keeps the
    /// new document id but stays pending. Exactly one log entry is appended
    /// per call.
    pub async fn reconcile(&self, case: &Case) -> Result<String, SyncError> {
        let synced = self.reconcile_case(case).await?;
        Ok(synced.dify_document_id.unwrap_or_default())
    }

    /// Fetch one case by id and reconcile it, returning the updated case.
    pub async fn sync_case(&self, id: &CaseId) -> Result<Case, SyncError> {
        let case = match self.store.get_case(id).await {
            Ok(Some(case)) => case,
            Ok(None) => return Err(SyncError::NotFound(*id)),
            Err(error) => {
                tracing::warn!(case_id = %id, %error, "Failed to load case for sync");
                self.append_log(NewSyncLogEntry::failure(
                    *id,
                    SyncAction::Create,
                    error.to_string(),
                ))
                .await;
                return Err(error.into());
            }
        };

        self.reconcile_case(&case).await
    }

    /// Reconcile every case that is currently unsynced.
    ///
    /// The work list is fetched once up front. Cases are processed one at a
    /// time and a failure never stops the run. Each entry is re-read right
    /// before its turn so a case synced by another request in the meantime is
    /// not pushed twice.
    pub async fn sync_all(&self) -> Result<SyncReport, SyncError> {
        let snapshot = self.store.list_unsynced_cases().await?;
        let mut report = SyncReport {
            total: snapshot.len(),
            ..SyncReport::default()
        };

        if snapshot.is_empty() {
            tracing::info!("No cases to sync");
            return Ok(report);
        }

        tracing::info!(total = report.total, "Starting batch sync");

        for queued in &snapshot {
            let case = match self.store.get_case(&queued.id).await {
                Ok(Some(case)) if case.is_synced => {
                    tracing::debug!(case_id = %queued.id, "Case already synced, skipping");
                    report.skipped += 1;
                    continue;
                }
                Ok(Some(case)) => case,
                Ok(None) => {
                    tracing::debug!(case_id = %queued.id, "Case deleted before sync, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(error) => {
                    self.append_log(NewSyncLogEntry::failure(
                        queued.id,
                        action_for(queued),
                        error.to_string(),
                    ))
                    .await;
                    report.failed += 1;
                    report.errors.push(format!("{}: {error}", queued.id));
                    continue;
                }
            };

            match self.reconcile_case(&case).await {
                Ok(_) => report.synced += 1,
                Err(error) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {error}", case.id));
                }
            }
        }

        tracing::info!(
            total = report.total,
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "Batch sync finished"
        );
        Ok(report)
    }

    async fn reconcile_case(&self, case: &Case) -> Result<Case, SyncError> {
        let name = case_document_name(case);
        let text = render_case_markdown(case);
        let action = action_for(case);

        let pushed = match case.dify_document_id.as_deref() {
            Some(document_id) => self.index.update_document(document_id, &name, &text).await,
            None => self.index.create_document(&name, &text).await,
        };

        let IndexedDocument { document_id, .. } = match pushed {
            Ok(document) => document,
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(
                    case_id = %case.id,
                    action = action.as_str(),
                    error = %message,
                    "Case sync failed"
                );
                self.append_log(NewSyncLogEntry::failure(case.id, action, message))
                    .await;
                return Err(error.into());
            }
        };

        let marked = self
            .store
            .mark_case_synced(&case.id, &document_id, case.updated_at)
            .await;
        let synced = match marked {
            Ok(synced) => synced,
            Err(error) => {
                let message = format!(
                    "document {document_id} was indexed but the case update failed: {error}"
                );
                tracing::warn!(
                    case_id = %case.id,
                    action = action.as_str(),
                    error = %message,
                    "Case sync failed"
                );
                self.append_log(NewSyncLogEntry::failure(case.id, action, message))
                    .await;
                return Err(error.into());
            }
        };

        self.append_log(NewSyncLogEntry::success(case.id, action, &document_id))
            .await;
        if !synced.is_synced {
            tracing::info!(
                case_id = %case.id,
                document_id = %document_id,
                "Case was edited during sync; left pending"
            );
        }
        tracing::info!(
            case_id = %case.id,
            action = action.as_str(),
            document_id = %document_id,
            "Case synced"
        );
        Ok(synced)
    }

    /// Best-effort log write; a failure here never changes the sync result.
    async fn append_log(&self, entry: NewSyncLogEntry) {
        let case_id = *entry.case_id();
        let status = entry.status();
        if let Err(error) = self.store.append_sync_log(entry).await {
            tracing::warn!(
                case_id = %case_id,
                status = status.as_str(),
                %error,
                "Failed to write sync log entry"
            );
        }
    }
}

const fn action_for(case: &Case) -> SyncAction {
    if case.has_document() {
        SyncAction::Update
    } else {
        SyncAction::Create
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::index::{IndexError, IndexResult};
    use crate::models::{CaseDraft, SyncLogEntry, SyncStatus};

    #[derive(Default)]
    struct StoreState {
        cases: HashMap<CaseId, Case>,
        logs: Vec<SyncLogEntry>,
        stale_snapshot: Option<Vec<Case>>,
        fail_reads: bool,
        fail_mark: bool,
        fail_log_writes: bool,
    }

    #[derive(Clone, Default)]
    struct FakeStore {
        state: Arc<Mutex<StoreState>>,
    }

    impl FakeStore {
        fn insert(&self, case: Case) -> CaseId {
            let id = case.id;
            self.state.lock().unwrap().cases.insert(id, case);
            id
        }

        fn case(&self, id: &CaseId) -> Case {
            self.state.lock().unwrap().cases[id].clone()
        }

        fn logs(&self) -> Vec<SyncLogEntry> {
            self.state.lock().unwrap().logs.clone()
        }

        fn configure(&self, apply: impl FnOnce(&mut StoreState)) {
            apply(&mut self.state.lock().unwrap());
        }
    }

    #[async_trait]
    impl CaseStore for FakeStore {
        async fn get_case(&self, id: &CaseId) -> crate::Result<Option<Case>> {
            let state = self.state.lock().unwrap();
            if state.fail_reads {
                return Err(crate::Error::Database("connection reset".to_string()));
            }
            Ok(state.cases.get(id).cloned())
        }

        async fn list_unsynced_cases(&self) -> crate::Result<Vec<Case>> {
            let state = self.state.lock().unwrap();
            if let Some(snapshot) = &state.stale_snapshot {
                return Ok(snapshot.clone());
            }
            let mut cases: Vec<Case> = state
                .cases
                .values()
                .filter(|case| !case.is_synced)
                .cloned()
                .collect();
            cases.sort_by_key(|case| case.id.as_str());
            Ok(cases)
        }

        async fn mark_case_synced(
            &self,
            id: &CaseId,
            document_id: &str,
            seen_updated_at: i64,
        ) -> crate::Result<Case> {
            let mut state = self.state.lock().unwrap();
            if state.fail_mark {
                return Err(crate::Error::Database("disk I/O error".to_string()));
            }
            let case = state
                .cases
                .get_mut(id)
                .ok_or_else(|| crate::Error::NotFound(id.to_string()))?;
            case.dify_document_id = Some(document_id.to_string());
            case.is_synced = case.updated_at == seen_updated_at;
            Ok(case.clone())
        }
    }

    #[async_trait]
    impl SyncLogStore for FakeStore {
        async fn append_sync_log(&self, entry: NewSyncLogEntry) -> crate::Result<SyncLogEntry> {
            let mut state = self.state.lock().unwrap();
            if state.fail_log_writes {
                return Err(crate::Error::Database("sync_logs is read-only".to_string()));
            }
            let id = i64::try_from(state.logs.len()).unwrap() + 1;
            let stored = entry.into_entry(id, 1_700_000_000_000 + id);
            state.logs.push(stored.clone());
            Ok(stored)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum IndexCall {
        Create { name: String, text: String },
        Update { document_id: String, text: String },
    }

    /// Scripted index: ids start at `doc-123`, failures are keyed by case title.
    #[derive(Default)]
    struct FakeIndex {
        calls: Mutex<Vec<IndexCall>>,
        failing_titles: HashSet<String>,
        failure_message: String,
    }

    impl FakeIndex {
        fn failing(titles: &[&str], message: &str) -> Self {
            Self {
                failing_titles: titles.iter().map(|title| (*title).to_string()).collect(),
                failure_message: message.to_string(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<IndexCall> {
            self.calls.lock().unwrap().clone()
        }

        fn check(&self, name: &str) -> IndexResult<()> {
            if self
                .failing_titles
                .iter()
                .any(|title| name.ends_with(&format!(" - {title}")))
            {
                return Err(IndexError::Api(self.failure_message.clone()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentIndex for FakeIndex {
        async fn create_document(&self, name: &str, text: &str) -> IndexResult<IndexedDocument> {
            let created = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(IndexCall::Create {
                    name: name.to_string(),
                    text: text.to_string(),
                });
                calls
                    .iter()
                    .filter(|call| matches!(call, IndexCall::Create { .. }))
                    .count()
            };
            self.check(name)?;
            Ok(IndexedDocument {
                document_id: format!("doc-{}", 122 + created),
                indexing_status: Some("waiting".to_string()),
            })
        }

        async fn update_document(
            &self,
            document_id: &str,
            name: &str,
            text: &str,
        ) -> IndexResult<IndexedDocument> {
            self.calls.lock().unwrap().push(IndexCall::Update {
                document_id: document_id.to_string(),
                text: text.to_string(),
            });
            self.check(name)?;
            Ok(IndexedDocument {
                document_id: document_id.to_string(),
                indexing_status: Some("indexing".to_string()),
            })
        }

        async fn delete_document(&self, _document_id: &str) -> IndexResult<()> {
            Ok(())
        }
    }

    fn case(title: &str) -> Case {
        Case::new(CaseDraft {
            title: title.to_string(),
            ..CaseDraft::default()
        })
        .unwrap()
    }

    fn reconciler(store: &FakeStore, index: Arc<FakeIndex>) -> Reconciler<FakeStore> {
        Reconciler::new(store.clone(), index)
    }

    #[tokio::test]
    async fn new_case_is_created_and_marked_synced() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let original = case("Case A");
        let id = store.insert(original.clone());

        let document_id = reconciler(&store, index.clone())
            .reconcile(&original)
            .await
            .unwrap();

        assert_eq!(document_id, "doc-123");
        let stored = store.case(&id);
        assert!(stored.is_synced);
        assert_eq!(stored.dify_document_id.as_deref(), Some("doc-123"));

        assert_eq!(
            index.calls(),
            vec![IndexCall::Create {
                name: case_document_name(&original),
                text: render_case_markdown(&original),
            }]
        );

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].case_id, id);
        assert_eq!(logs[0].action, SyncAction::Create);
        assert_eq!(logs[0].status, SyncStatus::Success);
        assert_eq!(logs[0].dify_document_id.as_deref(), Some("doc-123"));
        assert_eq!(logs[0].error_message, None);
    }

    #[tokio::test]
    async fn case_with_document_is_updated_not_created() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let mut edited = case("Case A");
        edited.dify_document_id = Some("doc-123".to_string());
        edited.notes = "Edited after first sync".to_string();
        let id = store.insert(edited.clone());

        let document_id = reconciler(&store, index.clone())
            .reconcile(&edited)
            .await
            .unwrap();

        assert_eq!(document_id, "doc-123");
        assert_eq!(
            index.calls(),
            vec![IndexCall::Update {
                document_id: "doc-123".to_string(),
                text: render_case_markdown(&edited),
            }]
        );
        let stored = store.case(&id);
        assert!(stored.is_synced);
        assert_eq!(stored.dify_document_id.as_deref(), Some("doc-123"));

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, SyncAction::Update);
        assert_eq!(logs[0].status, SyncStatus::Success);
    }

    #[tokio::test]
    async fn index_failure_leaves_case_untouched_and_logs_failure() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::failing(&["Case A"], "503 Service Unavailable"));
        let original = case("Case A");
        let id = store.insert(original.clone());

        let err = reconciler(&store, index)
            .reconcile(&original)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Index(_)));
        assert_eq!(err.to_string(), "503 Service Unavailable");
        assert_eq!(store.case(&id), original);

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncStatus::Failed);
        assert_eq!(
            logs[0].error_message.as_deref(),
            Some("503 Service Unavailable")
        );
        assert_eq!(logs[0].dify_document_id, None);
    }

    #[tokio::test]
    async fn failed_update_keeps_stale_document_id_and_unsynced_flag() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::failing(&["Case B"], "timeout"));
        let mut edited = case("Case B");
        edited.dify_document_id = Some("doc-7".to_string());
        let id = store.insert(edited.clone());

        reconciler(&store, index.clone())
            .reconcile(&edited)
            .await
            .unwrap_err();

        let stored = store.case(&id);
        assert!(!stored.is_synced);
        assert_eq!(stored.dify_document_id.as_deref(), Some("doc-7"));
        assert!(matches!(index.calls()[0], IndexCall::Update { .. }));
        assert_eq!(store.logs()[0].action, SyncAction::Update);
    }

    #[tokio::test]
    async fn store_failure_after_indexing_is_reported_and_logged_once() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let original = case("Case C");
        let id = store.insert(original.clone());
        store.configure(|state| state.fail_mark = true);

        let err = reconciler(&store, index)
            .reconcile(&original)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(_)));
        assert_eq!(store.case(&id), original);
        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncStatus::Failed);
        assert!(logs[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("doc-123"));
    }

    #[tokio::test]
    async fn log_write_failure_does_not_change_result() {
        let store = FakeStore::default();
        let original = case("Case D");
        let id = store.insert(original.clone());
        store.configure(|state| state.fail_log_writes = true);

        let ok = reconciler(&store, Arc::new(FakeIndex::default()))
            .reconcile(&original)
            .await;
        assert_eq!(ok.unwrap(), "doc-123");
        assert!(store.case(&id).is_synced);

        let failing = case("Case E");
        store.insert(failing.clone());
        let err = reconciler(&store, Arc::new(FakeIndex::failing(&["Case E"], "bad gateway")))
            .reconcile(&failing)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bad gateway");
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn batch_isolates_failures_and_attempts_every_case() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::failing(&["Second"], "503 Service Unavailable"));
        let first = store.insert(case("First"));
        let second = store.insert(case("Second"));
        let third = store.insert(case("Third"));

        let report = reconciler(&store, index.clone()).sync_all().await.unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.synced, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            report.errors,
            vec![format!("{second}: 503 Service Unavailable")]
        );
        assert_eq!(index.calls().len(), 3);
        assert!(store.case(&first).is_synced);
        assert!(!store.case(&second).is_synced);
        assert!(store.case(&third).is_synced);

        let logs = store.logs();
        assert_eq!(logs.len(), 3);
        assert_eq!(
            logs.iter()
                .filter(|entry| entry.status == SyncStatus::Failed)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn batch_where_every_case_fails_still_reports() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::failing(&["One", "Two"], "down"));
        store.insert(case("One"));
        store.insert(case("Two"));

        let report = reconciler(&store, index).sync_all().await.unwrap();

        assert_eq!(report.synced, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors.len(), 2);
    }

    #[tokio::test]
    async fn rerun_after_full_success_is_a_no_op() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        store.insert(case("One"));
        store.insert(case("Two"));
        let reconciler = reconciler(&store, index.clone());

        let first = reconciler.sync_all().await.unwrap();
        assert_eq!(first.synced, 2);

        let second = reconciler.sync_all().await.unwrap();
        assert_eq!(second, SyncReport::default());
        assert_eq!(index.calls().len(), 2);
        assert_eq!(store.logs().len(), 2);
    }

    #[tokio::test]
    async fn empty_snapshot_writes_no_logs() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());

        let report = reconciler(&store, index.clone()).sync_all().await.unwrap();

        assert_eq!(report, SyncReport::default());
        assert!(index.calls().is_empty());
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn batch_skips_cases_synced_after_snapshot() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let pending = case("Pending");
        let mut raced = case("Raced");
        store.insert(pending.clone());
        store.insert(raced.clone());
        store.configure(|state| state.stale_snapshot = Some(vec![pending.clone(), raced.clone()]));

        raced.dify_document_id = Some("doc-900".to_string());
        raced.is_synced = true;
        store.insert(raced.clone());

        let report = reconciler(&store, index.clone()).sync_all().await.unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.synced, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(index.calls().len(), 1);
        assert_eq!(store.case(&raced.id).dify_document_id.as_deref(), Some("doc-900"));
    }

    #[tokio::test]
    async fn batch_skips_cases_deleted_after_snapshot() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let ghost = case("Ghost");
        store.configure(|state| state.stale_snapshot = Some(vec![ghost]));

        let report = reconciler(&store, index.clone()).sync_all().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(index.calls().is_empty());
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn batch_read_failure_counts_as_failed_and_is_logged() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let queued = case("Unreachable");
        let id = store.insert(queued.clone());
        store.configure(|state| {
            state.stale_snapshot = Some(vec![queued]);
            state.fail_reads = true;
        });

        let report = reconciler(&store, index.clone()).sync_all().await.unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.synced, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.errors, vec![format!("{id}: Database error: connection reset")]);
        assert!(index.calls().is_empty());

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].case_id, id);
        assert_eq!(logs[0].action, SyncAction::Create);
        assert_eq!(logs[0].status, SyncStatus::Failed);
        assert_eq!(
            logs[0].error_message.as_deref(),
            Some("Database error: connection reset")
        );
    }

    #[tokio::test]
    async fn case_edited_during_push_keeps_new_document_but_stays_pending() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let pushed = case("Case F");
        let id = store.insert(pushed.clone());

        let mut edited = pushed.clone();
        edited.notes = "Edited after the push started".to_string();
        edited.updated_at += 1;
        store.insert(edited);

        let document_id = reconciler(&store, index)
            .reconcile(&pushed)
            .await
            .unwrap();

        assert_eq!(document_id, "doc-123");
        let stored = store.case(&id);
        assert!(!stored.is_synced);
        assert_eq!(stored.dify_document_id.as_deref(), Some("doc-123"));
        assert_eq!(stored.notes, "Edited after the push started");
        assert_eq!(store.logs()[0].status, SyncStatus::Success);
    }

    #[tokio::test]
    async fn sync_case_returns_updated_snapshot() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let id = store.insert(case("Single"));

        let synced = reconciler(&store, index).sync_case(&id).await.unwrap();

        assert!(synced.is_synced);
        assert_eq!(synced.dify_document_id.as_deref(), Some("doc-123"));
        assert_eq!(synced, store.case(&id));
    }

    #[tokio::test]
    async fn sync_case_unknown_id_is_not_found_without_log() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let missing = CaseId::new();

        let err = reconciler(&store, index.clone())
            .sync_case(&missing)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NotFound(id) if id == missing));
        assert!(index.calls().is_empty());
        assert!(store.logs().is_empty());
    }

    #[tokio::test]
    async fn sync_case_read_failure_is_logged_and_propagated() {
        let store = FakeStore::default();
        let index = Arc::new(FakeIndex::default());
        let id = store.insert(case("Unreadable"));
        store.configure(|state| state.fail_reads = true);

        let err = reconciler(&store, index.clone())
            .sync_case(&id)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(_)));
        assert!(index.calls().is_empty());
        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncStatus::Failed);
        assert!(logs[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection reset"));
    }

    #[tokio::test]
    async fn sync_case_read_failure_with_broken_log_still_surfaces_primary_error() {
        let store = FakeStore::default();
        let id = store.insert(case("Doubly broken"));
        store.configure(|state| {
            state.fail_reads = true;
            state.fail_log_writes = true;
        });

        let err = reconciler(&store, Arc::new(FakeIndex::default()))
            .sync_case(&id)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("connection reset"));
    }
}
