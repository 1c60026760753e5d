//! HTTP request handlers for the research service.
//!
//! Submission, status, report, cancel and resume endpoints, the style guide
//! listing and a health check, using axum.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider, SessionStore};
use scrivener_domain::{FinalReport, Session, SessionId, SessionStatus, Stage};
use scrivener_pipeline::{ResearchService, ServiceError, SessionStatusView};
use scrivener_research::{style_guides, ResearchConfig, StyleGuideInfo};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{info, warn};

/// The service operations the HTTP layer needs
///
/// Lets the router hold any [`ResearchService`] regardless of which
/// collaborators it was built with.
pub trait ResearchBackend: Send + Sync + 'static {
    /// Start a new session
    fn submit(&self, topic: &str, config: Option<ResearchConfig>) -> Result<SessionId, ServiceError>;
    /// Status of a session
    fn status(&self, id: SessionId) -> Result<SessionStatusView, ServiceError>;
    /// Final report of a finished session
    fn report(&self, id: SessionId) -> Result<FinalReport, ServiceError>;
    /// Request cancellation
    fn cancel(&self, id: SessionId) -> Result<bool, ServiceError>;
    /// Continue a stopped session
    fn resume(&self, id: SessionId) -> Result<(), ServiceError>;
    /// All sessions, newest first
    fn sessions(&self) -> Result<Vec<Session>, ServiceError>;
    /// Sessions running now and the limit
    fn load(&self) -> (usize, usize);
}

impl<L, S, F, St> ResearchBackend for ResearchService<L, S, F, St>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
    St: SessionStore + Send + 'static,
    St::Error: Display,
{
    fn submit(&self, topic: &str, config: Option<ResearchConfig>) -> Result<SessionId, ServiceError> {
        self.submit_research(topic, config)
    }

    fn status(&self, id: SessionId) -> Result<SessionStatusView, ServiceError> {
        self.get_session_status(id)
    }

    fn report(&self, id: SessionId) -> Result<FinalReport, ServiceError> {
        self.get_final_report(id)
    }

    fn cancel(&self, id: SessionId) -> Result<bool, ServiceError> {
        ResearchService::cancel(self, id)
    }

    fn resume(&self, id: SessionId) -> Result<(), ServiceError> {
        ResearchService::resume(self, id)
    }

    fn sessions(&self) -> Result<Vec<Session>, ServiceError> {
        self.list_sessions()
    }

    fn load(&self) -> (usize, usize) {
        (self.active_count(), self.config().max_active_sessions)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The research service
    pub service: Arc<dyn ResearchBackend>,
}

/// Research submission request
#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    /// Topic or question to research
    pub topic: String,
    /// Overrides for this session; the server defaults apply otherwise
    #[serde(default)]
    pub config: Option<ResearchConfig>,
}

/// Research submission response
#[derive(Debug, Serialize, Deserialize)]
pub struct ResearchResponse {
    /// Id of the new session
    pub session_id: SessionId,
    /// Status at submission, always running
    pub status: SessionStatus,
}

/// One row of the session listing
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub id: SessionId,
    /// Research topic
    pub topic: String,
    /// Last completed stage
    pub stage: Stage,
    /// Overall status
    pub status: SessionStatus,
    /// Revision rounds completed
    pub revision_count: u32,
    /// Creation time (Unix seconds)
    pub created_at: u64,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            topic: session.topic,
            stage: session.current_stage,
            status: session.status,
            revision_count: session.revision_count,
            created_at: session.created_at,
        }
    }
}

/// Cancel and resume response
#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Session id
    pub session_id: SessionId,
    /// Whether the request changed anything
    pub accepted: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Sessions running now
    pub active_sessions: usize,
    /// Sessions allowed at once
    pub max_active_sessions: usize,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Service-level error
    Service(ServiceError),
    /// Malformed session id in the path
    BadId(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadId(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Service(e) => {
                let status = match &e {
                    ServiceError::Input(_) => StatusCode::BAD_REQUEST,
                    ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                    ServiceError::AlreadyRunning(_)
                    | ServiceError::AlreadyFinished(_)
                    | ServiceError::NotReady(_) => StatusCode::CONFLICT,
                    ServiceError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
                    ServiceError::Store(_) | ServiceError::Pipeline(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    warn!("Request failed: {}", e);
                }
                (status, e.to_string())
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        AppError::Service(e)
    }
}

fn parse_id(raw: &str) -> Result<SessionId, AppError> {
    SessionId::from_string(raw).map_err(AppError::BadId)
}

/// POST /api/research - Submit a research topic
async fn submit_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> Result<(StatusCode, Json<ResearchResponse>), AppError> {
    let session_id = state.service.submit(&request.topic, request.config)?;
    info!("Submitted session {}", session_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(ResearchResponse {
            session_id,
            status: SessionStatus::Running,
        }),
    ))
}

/// GET /api/sessions - List sessions
async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let sessions = state.service.sessions()?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

/// GET /api/sessions/:id/status - Session progress
async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusView>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.status(id)?))
}

/// GET /api/sessions/:id/report - Final report
async fn session_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FinalReport>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.report(id)?))
}

/// POST /api/sessions/:id/cancel - Stop at the next stage boundary
async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ControlResponse>, AppError> {
    let session_id = parse_id(&id)?;
    let accepted = state.service.cancel(session_id)?;
    Ok(Json(ControlResponse {
        session_id,
        accepted,
    }))
}

/// POST /api/sessions/:id/resume - Continue from the last completed stage
async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ControlResponse>), AppError> {
    let session_id = parse_id(&id)?;
    state.service.resume(session_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ControlResponse {
            session_id,
            accepted: true,
        }),
    ))
}

/// GET /api/style-guides - Tones the style pass can apply
async fn list_style_guides() -> Json<Vec<StyleGuideInfo>> {
    Json(style_guides())
}

/// GET /health - Service health
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let (active_sessions, max_active_sessions) = state.service.load();
    let status = if active_sessions >= max_active_sessions {
        "saturated"
    } else {
        "healthy"
    };

    Json(HealthCheckResponse {
        status: status.to_string(),
        active_sessions,
        max_active_sessions,
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/api/research", post(submit_research))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id/status", get(session_status))
        .route("/api/sessions/:id/report", get(session_report))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        .route("/api/sessions/:id/resume", post(resume_session))
        .route("/api/style-guides", get(list_style_guides))
        .route("/health", get(health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use scrivener_llm::MockProvider;
    use scrivener_pipeline::{PipelineConfig, SharedStore};
    use scrivener_store::SqliteSessionStore;
    use scrivener_web::{MockFetcher, MockSearch};
    use tower::ServiceExt; // for oneshot

    fn create_test_state() -> AppState {
        let service = ResearchService::new(
            Arc::new(MockProvider::default()),
            Arc::new(MockSearch::default()),
            Arc::new(MockFetcher::new()),
            SharedStore::new(SqliteSessionStore::in_memory().unwrap()),
            PipelineConfig::default(),
        );
        AppState {
            service: Arc::new(service),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .uri("/api/sessions/not-a-uuid/status")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_topic_rejected() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/api/research")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"topic": "  "}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
