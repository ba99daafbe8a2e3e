use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use brokerkb_core::db::CaseFilter;
use brokerkb_core::export::render_case_markdown;
use brokerkb_core::index::DocumentIndex;
use brokerkb_core::models::{CaseDraft, SyncLogEntry, SyncOverview};
use brokerkb_core::services::DatabaseService;
use brokerkb_core::sync::{Reconciler, SyncReport};
use brokerkb_core::{Case, CaseId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, verify_admin_token};
use crate::config::AppConfig;
use crate::error::AppError;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    db: DatabaseService,
    index: Option<Arc<dyn DocumentIndex>>,
    // One sync run at a time per process.
    sync_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseService,
        index: Option<Arc<dyn DocumentIndex>>,
    ) -> Self {
        Self {
            config,
            db,
            index,
            sync_gate: Arc::new(Mutex::new(())),
        }
    }

    fn reconciler(&self) -> Result<Reconciler<DatabaseService>, AppError> {
        let index = self
            .index
            .clone()
            .ok_or_else(|| AppError::config("document index is not configured"))?;
        Ok(Reconciler::new(self.db.clone(), index))
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync", post(run_sync).get(sync_status))
        .route("/cases", get(list_cases).post(create_case))
        .route(
            "/cases/{id}",
            get(get_case).put(update_case).delete(delete_case),
        )
        .route("/cases/{id}/sync", post(sync_single_case))
        .route("/cases/{id}/logs", get(case_sync_logs))
        .route("/cases/{id}/markdown", get(case_markdown))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    document_index_configured: bool,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        document_index_configured: state.index.is_some(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    verify_admin_token(&state.config.admin_api_token, token)?;
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct SyncRunResponse {
    success: bool,
    total: usize,
    synced: usize,
    failed: usize,
    skipped: usize,
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl From<SyncReport> for SyncRunResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            success: true,
            message: (report.total == 0).then_some("No cases to sync"),
            total: report.total,
            synced: report.synced,
            failed: report.failed,
            skipped: report.skipped,
            errors: report.errors,
        }
    }
}

async fn run_sync(State(state): State<AppState>) -> Result<Json<SyncRunResponse>, AppError> {
    let reconciler = state.reconciler()?;
    let _guard = state.sync_gate.lock().await;
    let report = reconciler.sync_all().await?;
    tracing::info!(
        endpoint = "sync",
        total = report.total,
        synced = report.synced,
        failed = report.failed,
        "Batch sync requested"
    );
    Ok(Json(report.into()))
}

async fn sync_status(State(state): State<AppState>) -> Result<Json<SyncOverview>, AppError> {
    Ok(Json(state.db.sync_overview().await?))
}

#[derive(Debug, Serialize)]
struct CaseSyncResponse {
    success: bool,
    dify_document_id: Option<String>,
    data: Case,
}

async fn sync_single_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CaseSyncResponse>, AppError> {
    let reconciler = state.reconciler()?;
    let id = parse_case_id(&id)?;
    let _guard = state.sync_gate.lock().await;
    let case = reconciler.sync_case(&id).await?;
    Ok(Json(CaseSyncResponse {
        success: true,
        dify_document_id: case.dify_document_id.clone(),
        data: case,
    }))
}

#[derive(Debug, Deserialize)]
struct ListCasesQuery {
    synced: Option<bool>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_cases(
    State(state): State<AppState>,
    Query(query): Query<ListCasesQuery>,
) -> Result<Json<Vec<Case>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::bad_request(format!(
            "limit must be in [1, {MAX_PAGE_SIZE}]"
        )));
    }
    let filter = CaseFilter {
        synced: query.synced,
    };
    let cases = state
        .db
        .list_cases(filter, limit, query.offset.unwrap_or(0))
        .await?;
    Ok(Json(cases))
}

async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Case>, AppError> {
    let id = parse_case_id(&id)?;
    Ok(Json(load_case(&state, &id).await?))
}

async fn create_case(
    State(state): State<AppState>,
    payload: Result<Json<CaseDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Case>), AppError> {
    let Json(draft) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let case = state.db.create_case(draft).await?;
    tracing::info!(case_id = %case.id, "Created case");
    Ok((StatusCode::CREATED, Json(case)))
}

async fn update_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CaseDraft>, JsonRejection>,
) -> Result<Json<Case>, AppError> {
    let id = parse_case_id(&id)?;
    let Json(draft) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let case = state.db.update_case(&id, draft).await?;
    tracing::info!(case_id = %case.id, "Updated case");
    Ok(Json(case))
}

#[derive(Debug, Serialize)]
struct DeleteCaseResponse {
    success: bool,
    id: CaseId,
    document_deleted: bool,
}

async fn delete_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteCaseResponse>, AppError> {
    let id = parse_case_id(&id)?;
    let case = state.db.delete_case(&id).await?;

    let mut document_deleted = false;
    if let (Some(document_id), Some(index)) = (case.dify_document_id.as_deref(), &state.index) {
        match index.delete_document(document_id).await {
            Ok(()) => document_deleted = true,
            Err(error) => tracing::warn!(
                case_id = %id,
                document_id,
                %error,
                "Failed to delete indexed document for removed case"
            ),
        }
    }

    tracing::info!(case_id = %id, document_deleted, "Deleted case");
    Ok(Json(DeleteCaseResponse {
        success: true,
        id,
        document_deleted,
    }))
}

async fn case_sync_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SyncLogEntry>>, AppError> {
    let id = parse_case_id(&id)?;
    load_case(&state, &id).await?;
    Ok(Json(state.db.list_sync_logs_for_case(&id).await?))
}

async fn case_markdown(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_case_id(&id)?;
    let case = load_case(&state, &id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        render_case_markdown(&case),
    ))
}

async fn load_case(state: &AppState, id: &CaseId) -> Result<Case, AppError> {
    state
        .db
        .get_case(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("case {id}")))
}

fn parse_case_id(raw: &str) -> Result<CaseId, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::bad_request(format!("`{raw}` is not a valid case id")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use brokerkb_core::index::{IndexError, IndexResult, IndexedDocument};
    use serde_json::{json, Value};

    use super::*;

    const TOKEN: &str = "admin-token-0123456789";

    #[derive(Default)]
    struct StubIndex {
        unavailable: bool,
        created: StdMutex<usize>,
        deleted: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentIndex for StubIndex {
        async fn create_document(&self, _name: &str, _text: &str) -> IndexResult<IndexedDocument> {
            if self.unavailable {
                return Err(IndexError::Api("503 Service Unavailable".to_string()));
            }
            let mut created = self.created.lock().unwrap();
            *created += 1;
            Ok(IndexedDocument {
                document_id: format!("doc-{}", 122 + *created),
                indexing_status: Some("waiting".to_string()),
            })
        }

        async fn update_document(
            &self,
            document_id: &str,
            _name: &str,
            _text: &str,
        ) -> IndexResult<IndexedDocument> {
            if self.unavailable {
                return Err(IndexError::Api("503 Service Unavailable".to_string()));
            }
            Ok(IndexedDocument {
                document_id: document_id.to_string(),
                indexing_status: Some("indexing".to_string()),
            })
        }

        async fn delete_document(&self, document_id: &str) -> IndexResult<()> {
            self.deleted.lock().unwrap().push(document_id.to_string());
            Ok(())
        }
    }

    struct TestApp {
        base_url: String,
        client: reqwest::Client,
        db: DatabaseService,
    }

    impl TestApp {
        async fn spawn(index: Option<Arc<StubIndex>>) -> Self {
            let db = DatabaseService::open_in_memory().await.unwrap();
            let config = Arc::new(AppConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                db_path: ":memory:".to_string(),
                admin_api_token: TOKEN.to_string(),
                dify: None,
            });
            let index = index.map(|index| index as Arc<dyn DocumentIndex>);
            let router = app_router(AppState::new(config, db.clone(), index));

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });

            Self {
                base_url: format!("http://{addr}"),
                client: reqwest::Client::new(),
                db,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{path}", self.base_url)
        }

        async fn post(&self, path: &str) -> reqwest::Response {
            self.client
                .post(self.url(path))
                .bearer_auth(TOKEN)
                .send()
                .await
                .unwrap()
        }

        async fn get(&self, path: &str) -> reqwest::Response {
            self.client
                .get(self.url(path))
                .bearer_auth(TOKEN)
                .send()
                .await
                .unwrap()
        }

        async fn create_case(&self, title: &str) -> Value {
            let response = self
                .client
                .post(self.url("/v1/cases"))
                .bearer_auth(TOKEN)
                .json(&json!({ "title": title, "loan_type": "mortgage", "amount": 250000 }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::CREATED);
            response.json().await.unwrap()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_is_public() {
        let app = TestApp::spawn(None).await;
        let response = app.client.get(app.url("/healthz")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["document_index_configured"], false);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn v1_routes_require_admin_token() {
        let app = TestApp::spawn(None).await;

        let missing = app.client.get(app.url("/v1/sync")).send().await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::UNAUTHORIZED);

        let wrong = app
            .client
            .get(app.url("/v1/sync"))
            .bearer_auth("not-the-admin-token")
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: Value = wrong.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("Unauthorized"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_sync_with_nothing_pending_reports_message() {
        let app = TestApp::spawn(Some(Arc::new(StubIndex::default()))).await;

        let response = app.post("/v1/sync").await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["synced"], 0);
        assert_eq!(body["failed"], 0);
        assert_eq!(body["message"], "No cases to sync");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_sync_pushes_cases_and_status_reflects_it() {
        let index = Arc::new(StubIndex::default());
        let app = TestApp::spawn(Some(index.clone())).await;
        app.create_case("Case A").await;
        app.create_case("Case B").await;

        let body: Value = app.post("/v1/sync").await.json().await.unwrap();
        assert_eq!(body["synced"], 2);
        assert_eq!(body["failed"], 0);
        assert_eq!(body["errors"], json!([]));
        assert!(body.get("message").is_none());

        let status: Value = app.get("/v1/sync").await.json().await.unwrap();
        assert_eq!(status["total"], 2);
        assert_eq!(status["synced"], 2);
        assert_eq!(status["pending"], 0);
        assert_eq!(status["recent_logs"].as_array().unwrap().len(), 2);
        assert_eq!(status["recent_logs"][0]["status"], "success");

        let unsynced: Value = app
            .get("/v1/cases?synced=false")
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(unsynced, json!([]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_sync_returns_document_and_record() {
        let app = TestApp::spawn(Some(Arc::new(StubIndex::default()))).await;
        let case = app.create_case("Case A").await;
        let id = case["id"].as_str().unwrap();

        let response = app.post(&format!("/v1/cases/{id}/sync")).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["dify_document_id"], "doc-123");
        assert_eq!(body["data"]["is_synced"], true);
        assert_eq!(body["data"]["id"], id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_sync_unknown_case_is_404() {
        let app = TestApp::spawn(Some(Arc::new(StubIndex::default()))).await;

        let response = app
            .post(&format!("/v1/cases/{}/sync", CaseId::new()))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Not found"));
        assert!(app.db.recent_sync_logs(10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_sync_outage_is_500_and_logged() {
        let index = Arc::new(StubIndex {
            unavailable: true,
            ..StubIndex::default()
        });
        let app = TestApp::spawn(Some(index)).await;
        let case = app.create_case("Case B").await;
        let id = case["id"].as_str().unwrap();

        let response = app.post(&format!("/v1/cases/{id}/sync")).await;
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "503 Service Unavailable");

        let logs: Value = app
            .get(&format!("/v1/cases/{id}/logs"))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(logs[0]["status"], "failed");
        assert_eq!(logs[0]["error_message"], "503 Service Unavailable");

        let stored: Value = app.get(&format!("/v1/cases/{id}")).await.json().await.unwrap();
        assert_eq!(stored["is_synced"], false);
        assert_eq!(stored["dify_document_id"], Value::Null);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_routes_report_missing_index_configuration() {
        let app = TestApp::spawn(None).await;
        let case = app.create_case("Case A").await;
        let id = case["id"].as_str().unwrap();

        for path in ["/v1/sync".to_string(), format!("/v1/cases/{id}/sync")] {
            let response = app.post(&path).await;
            assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = response.json().await.unwrap();
            assert_eq!(
                body["error"],
                "Configuration error: document index is not configured"
            );
        }

        let status = app.get("/v1/sync").await;
        assert_eq!(status.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_case_id_is_rejected() {
        let app = TestApp::spawn(None).await;
        let response = app.get("/v1/cases/not-a-uuid").await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_rejects_blank_title() {
        let app = TestApp::spawn(None).await;
        let response = app
            .client
            .post(app.url("/v1/cases"))
            .bearer_auth(TOKEN)
            .json(&json!({ "title": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn edit_marks_unsynced_and_delete_removes_remote_document() {
        let index = Arc::new(StubIndex::default());
        let app = TestApp::spawn(Some(index.clone())).await;
        let case = app.create_case("Case A").await;
        let id = case["id"].as_str().unwrap().to_string();
        app.post(&format!("/v1/cases/{id}/sync")).await;

        let edited: Value = app
            .client
            .put(app.url(&format!("/v1/cases/{id}")))
            .bearer_auth(TOKEN)
            .json(&json!({ "title": "Case A", "notes": "Guarantor added" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(edited["is_synced"], false);
        assert_eq!(edited["dify_document_id"], "doc-123");

        let deleted: Value = app
            .client
            .delete(app.url(&format!("/v1/cases/{id}")))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(deleted["document_deleted"], true);
        assert_eq!(*index.deleted.lock().unwrap(), vec!["doc-123".to_string()]);

        let gone = app.get(&format!("/v1/cases/{id}")).await;
        assert_eq!(gone.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn markdown_route_renders_case_text() {
        let app = TestApp::spawn(None).await;
        let case = app.create_case("Self-employed refinance").await;
        let id = case["id"].as_str().unwrap();

        let response = app.get(&format!("/v1/cases/{id}/markdown")).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE.as_str()]
            .to_str()
            .unwrap()
            .starts_with("text/markdown"));
        let text = response.text().await.unwrap();
        assert!(text.starts_with("# Self-employed refinance\n"));
        assert!(text.contains("- Amount: 250,000"));
    }
}
