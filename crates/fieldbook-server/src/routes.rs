//! Router, handlers and the server loop

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fieldbook_core::payload::UPLOAD_SOURCE;
use fieldbook_core::{ErrorCode, ProjectId};
use fieldbook_ingest::{IngestPipeline, UploadContext};
use fieldbook_storage::EntryStore;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::{import_auth, user_id, USER_ID_HEADER};
use crate::config::{ServerConfig, MAX_BODY_SIZE};
use crate::response::{success, ApiError};

/// Shared handler state
pub struct AppState {
    pub pipeline: IngestPipeline<dyn EntryStore>,
    pub import_token: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntryStore>, config: &ServerConfig) -> Self {
        Self {
            pipeline: IngestPipeline::new(store, config.ingest.clone()),
            import_token: config.import_token.clone(),
        }
    }
}

/// Request body: the upload sits under `data`
#[derive(Debug, Deserialize)]
struct Envelope {
    data: Value,
}

fn parse_envelope(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice::<Envelope>(body)
        .map(|e| e.data)
        .map_err(|e| {
            tracing::debug!(error = %e, "request body rejected");
            ApiError::new(UPLOAD_SOURCE, ErrorCode::PayloadInvalid)
        })
}

fn parse_project_id(raw: &str) -> Result<ProjectId, ApiError> {
    ProjectId::from_string(raw).map_err(|_| ApiError::new("project", ErrorCode::ProjectNotFound))
}

/// Create the router
pub fn create_router(store: Arc<dyn EntryStore>, config: &ServerConfig) -> Router {
    let state = Arc::new(AppState::new(store, config));

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
        ]);

    let import = Router::new()
        .route("/api/import/:project_id", post(import_handler))
        .layer(middleware::from_fn_with_state(state.clone(), import_auth));

    Router::new()
        .route("/api/upload/:project_id", post(upload_handler))
        .route("/api/unique/:project_id", post(unique_handler))
        .route("/health", get(health_handler))
        .merge(import)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = match state.pipeline.store().health_check().await {
        Ok(true) => "ok",
        Ok(false) => "degraded",
        Err(e) => {
            tracing::error!(error = %e, "storage health check failed");
            "error"
        }
    };
    Json(json!({
        "status": "ok",
        "server": "fieldbook-server",
        "storage": storage,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let project_id = parse_project_id(&project_id)?;
    let ctx = match user_id(&headers)? {
        Some(id) => UploadContext::user(id),
        None => UploadContext::anonymous(),
    };
    let payload = parse_envelope(&body)?;

    let outcome = state.pipeline.ingest(&project_id, payload, &ctx).await?;
    Ok(success(outcome))
}

async fn import_handler(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let project_id = parse_project_id(&project_id)?;
    let payload = parse_envelope(&body)?;

    let outcome = state
        .pipeline
        .ingest(&project_id, payload, &UploadContext::private_import())
        .await?;
    Ok(success(outcome))
}

async fn unique_handler(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let project_id = parse_project_id(&project_id)?;
    let ctx = match user_id(&headers)? {
        Some(id) => UploadContext::user(id),
        None => UploadContext::anonymous(),
    };
    let payload = parse_envelope(&body)?;

    state.pipeline.check_unique(&project_id, payload, &ctx).await?;
    Ok(Json(json!({ "data": { "code": "answer_unique" } })).into_response())
}

/// Run the upload server until the listener fails
pub async fn run_server(store: Arc<dyn EntryStore>, config: ServerConfig) -> anyhow::Result<()> {
    if config.import_token.is_none() {
        tracing::warn!("no import token configured, /api/import is disabled");
    }
    let router = create_router(store, &config);

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!("Fieldbook server listening on {}", config.addr);
    tracing::info!("  Upload endpoint: http://{}/api/upload/:project_id", config.addr);
    tracing::info!("  Health check: http://{}/health", config.addr);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fieldbook_core::{Form, Input, InputType, Project, ProjectDefinition, ProjectLimits};
    use fieldbook_ingest::IngestConfig;
    use fieldbook_storage::MemoryStorage;
    use tower::ServiceExt;

    const UUID: &str = "0b6a8f2e-6a56-4c4e-8a3c-1c2f6f1d9e11";

    async fn setup() -> (Router, Project) {
        let store: Arc<dyn EntryStore> = Arc::new(MemoryStorage::new());
        let definition = ProjectDefinition::new("p").with_form(
            Form::new("p_f1", "Household")
                .with_input(Input::new("p_f1_name", InputType::Text, "Name").title().required()),
        );
        let project = Project::from_definition("survey", definition, &ProjectLimits::default()).unwrap();
        store.save_project(&project).await.unwrap();

        let config = ServerConfig::default()
            .with_import_token("s3cret")
            .with_ingest(IngestConfig::without_throttle());
        (create_router(store, &config), project)
    }

    fn upload(project: &Project, name: &str) -> String {
        json!({"data": {
            "id": UUID,
            "type": "entry",
            "entry": {
                "entry_uuid": UUID,
                "created_at": "2024-05-01T10:00:00Z",
                "project_version": project.project_version(),
                "answers": {"p_f1_name": {"answer": name, "was_jumped": false}}
            },
            "attributes": {"form": {"ref": "p_f1", "type": "hierarchy"}},
            "relationships": {}
        }})
        .to_string()
    }

    fn post(uri: String, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upload_created_then_updated() {
        let (router, project) = setup().await;
        let uri = format!("/api/upload/{}", project.id);

        let (status, body) = send(&router, post(uri.clone(), upload(&project, "Ann"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["code"], "entry_created");
        assert_eq!(body["data"]["title"], "Ann");

        let (status, body) = send(&router, post(uri, upload(&project, "Annie"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["code"], "entry_updated");
    }

    #[tokio::test]
    async fn test_rejections_are_coded() {
        let (router, project) = setup().await;
        let uri = format!("/api/upload/{}", project.id);

        let (status, body) = send(&router, post(uri.clone(), upload(&project, ""))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["source"], "p_f1_name");
        assert_eq!(body["errors"][0]["code"], "answer_required");

        let (status, body) = send(&router, post(uri, "not json".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "payload_invalid");

        let (status, body) = send(&router, post("/api/upload/nope".to_string(), upload(&project, "Ann"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "project_not_found");
    }

    #[tokio::test]
    async fn test_import_requires_token() {
        let (router, project) = setup().await;
        let uri = format!("/api/import/{}", project.id);

        let (status, _) = send(&router, post(uri.clone(), upload(&project, "Ann"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut request = post(uri, upload(&project, "Ann"));
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["code"], "entry_created");
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = setup().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
