use crate::catalog::RunCatalog;
use crate::types::*;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Json, Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use runvault_artifact::{ArtifactRepository, ErrorKind, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Clone)]
pub struct AppState {
    pub repository: ArtifactRepository,
    pub catalog: Arc<dyn RunCatalog>,
}

/// Build the HTTP router.
///
/// Requests running longer than `request_timeout` are answered with
/// `408 Request Timeout` and their handler future is dropped, which aborts
/// the in-flight backend call.
pub fn create_router(
    repository: ArtifactRepository,
    catalog: Arc<dyn RunCatalog>,
    request_timeout: Duration,
) -> Router {
    let state = AppState {
        repository,
        catalog,
    };

    Router::new()
        // Health check endpoints
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
        // API endpoints
        .route("/api/v1/runs", post(register_run))
        .route("/api/v1/artifacts/list", get(list_artifacts))
        .route("/api/v1/artifacts/get", get(get_artifact))
        .route(
            "/api/v1/artifacts",
            axum::routing::put(put_artifact).delete(delete_artifact),
        )
        // Middleware layers (applied in reverse order)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint - returns OK if the service is running
async fn health_check() -> impl IntoResponse {
    tracing::debug!("Health check requested");
    (StatusCode::OK, "OK")
}

/// Readiness check endpoint
///
/// Backends are built lazily on first use, so readiness only reports that
/// at least one storage scheme is registered.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("Readiness check requested");

    if state.repository.registry().schemes().is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, "NO STORAGE BACKENDS");
    }
    (StatusCode::OK, "READY")
}

async fn register_run(
    State(state): State<AppState>,
    Json(req): Json<RegisterRunRequest>,
) -> Result<Json<RegisterRunResponse>, AppError> {
    // Reject unusable roots up front rather than on first artifact access
    state.repository.check_root(&req.artifact_uri)?;

    let run_id = state
        .catalog
        .register(req.run_id, req.artifact_uri.clone())
        .await?;

    Ok(Json(RegisterRunResponse {
        run_id,
        artifact_uri: req.artifact_uri,
    }))
}

async fn list_artifacts(
    State(state): State<AppState>,
    query: Result<Query<ArtifactQuery>, QueryRejection>,
) -> Result<Json<ListArtifactsResponse>, AppError> {
    let Query(query) = query?;
    let root_uri = state.catalog.artifact_uri(&query.run_id).await?;

    let files = state.repository.list(&root_uri, &query.path).await?;

    Ok(Json(ListArtifactsResponse { root_uri, files }))
}

async fn get_artifact(
    State(state): State<AppState>,
    query: Result<Query<ArtifactQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let root_uri = state.catalog.artifact_uri(&query.run_id).await?;

    let stream = state.repository.get(&root_uri, &query.path).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn put_artifact(
    State(state): State<AppState>,
    query: Result<Query<ArtifactQuery>, QueryRejection>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let Query(query) = query?;
    let root_uri = state.catalog.artifact_uri(&query.run_id).await?;

    state.repository.put(&root_uri, &query.path, body).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_artifact(
    State(state): State<AppState>,
    query: Result<Query<ArtifactQuery>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let Query(query) = query?;
    let root_uri = state.catalog.artifact_uri(&query.run_id).await?;

    state.repository.delete(&root_uri, &query.path).await?;

    Ok(StatusCode::NO_CONTENT)
}

// Error handling
#[derive(Debug)]
pub enum AppError {
    Storage(StorageError),
    Core(runvault_core::Error),
    BadRequest(String),
}

impl AppError {
    /// HTTP status and error code reported to the client
    pub fn status(&self) -> (StatusCode, &'static str) {
        const INVALID: (StatusCode, &str) = (StatusCode::BAD_REQUEST, "INVALID_PARAMETER_VALUE");
        const MISSING: (StatusCode, &str) = (StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST");
        const INTERNAL: (StatusCode, &str) = (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR");

        match self {
            AppError::Storage(err) => match err.kind() {
                ErrorKind::InvalidUri | ErrorKind::InvalidPath => INVALID,
                ErrorKind::NotFound => MISSING,
                ErrorKind::Backend | ErrorKind::BackendInit => INTERNAL,
            },
            AppError::Core(runvault_core::Error::RunNotFound(_)) => MISSING,
            AppError::Core(runvault_core::Error::Config(_)) => INVALID,
            AppError::BadRequest(_) => INVALID,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Storage(err) => write!(f, "{}", err),
            AppError::Core(err) => write!(f, "{}", err),
            AppError::BadRequest(message) => write!(f, "{}", message),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<runvault_core::Error> for AppError {
    fn from(err: runvault_core::Error) -> Self {
        AppError::Core(err)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error_code: error_code.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryRunCatalog;
    use axum::http::Request;
    use runvault_artifact::{InMemoryFactory, StorageRegistry};
    use tower::ServiceExt;

    fn router() -> Router {
        let mut registry = StorageRegistry::new();
        registry.register(InMemoryFactory::default());
        let catalog = InMemoryRunCatalog::with_runs([(
            "run-1".to_string(),
            "memory://bucket/exp1".to_string(),
        )]);

        create_router(
            ArtifactRepository::new(Arc::new(registry)),
            Arc::new(catalog),
            Duration::from_secs(5),
        )
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                AppError::from(StorageError::invalid_path("../x", "escapes root")),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(StorageError::NotFound("a".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(runvault_core::Error::run_not_found("r")),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(runvault_core::Error::config_error("run id cannot be blank")),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(StorageError::invalid_uri("/", "outside the allowed roots")),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(StorageError::backend("boom", "connection reset")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status().0, expected);
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let response = router()
            .oneshot(
                Request::get("/api/v1/artifacts/list?run_id=nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "RESOURCE_DOES_NOT_EXIST");
    }

    #[tokio::test]
    async fn test_missing_run_id_is_400() {
        let response = router()
            .oneshot(
                Request::get("/api/v1/artifacts/list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "INVALID_PARAMETER_VALUE");
    }

    #[tokio::test]
    async fn test_register_rejects_bad_uri() {
        let response = router()
            .oneshot(
                Request::post("/api/v1/runs")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"artifactUri": "ftp://host/x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
