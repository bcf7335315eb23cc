//! HTTP surface (§6.1), gated behind the `http-server` feature: `axum`
//! routes wiring `POST /sessions/start` and `POST /sessions/turn` onto the
//! Session Manager.
//!
//! Grounded on the `Router::new().route(...)` / `AppState` / custom
//! `IntoResponse` error-wrapper pattern from the `rust_agency` example's
//! `server.rs` — the teacher itself only carries a trait-based
//! `HttpServerAdapter` with no concrete `axum` router of its own.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::context::{CompetencyState, Event};
use crate::error::EngineError;
use crate::flow::TurnOutcome;
use crate::gateway::LlmTransport;
use crate::ports::{CandidateStore, RubricStore};
use crate::profile::Persona;
use crate::session::SessionManager;

/// Shared application state handed to every handler, mirroring the
/// `AppState { provider, speaker, ... }` bundle the `rust_agency` server
/// wraps in `Arc` once and clones cheaply per request.
pub struct AppState<T: LlmTransport, R: RubricStore, C: CandidateStore> {
    pub sessions: Arc<SessionManager<T>>,
    pub rubrics: Arc<R>,
    pub candidates: Arc<C>,
}

// Hand-rolled rather than `#[derive(Clone)]`: the derive would require
// `T: Clone` even though only the `Arc` needs to be cloned.
impl<T: LlmTransport, R: RubricStore, C: CandidateStore> Clone for AppState<T, R, C> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            rubrics: self.rubrics.clone(),
            candidates: self.candidates.clone(),
        }
    }
}

impl<T: LlmTransport, R: RubricStore, C: CandidateStore> AppState<T, R, C> {
    pub fn new(sessions: SessionManager<T>, rubrics: R, candidates: C) -> Self {
        Self { sessions: Arc::new(sessions), rubrics: Arc::new(rubrics), candidates: Arc::new(candidates) }
    }
}

/// Builds the router: `POST /sessions/start` and `POST /sessions/turn`,
/// the only two external entry points §6.1 names.
pub fn router<T, R, C>(state: AppState<T, R, C>) -> Router
where
    T: LlmTransport + 'static,
    R: RubricStore + 'static,
    C: CandidateStore + 'static,
{
    Router::new()
        .route("/sessions/start", post(start_session::<T, R, C>))
        .route("/sessions/turn", post(turn_session::<T, R, C>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    interview_id: String,
    candidate_id: String,
    persona: Option<Persona>,
}

#[derive(Debug, Deserialize)]
struct TurnRequest {
    session_id: String,
    answer: String,
    #[serde(default)]
    auto_send: bool,
    #[serde(default)]
    auto_generate: Option<u8>,
}

#[derive(Debug, Serialize)]
struct CompetencySnapshot {
    competency: String,
    #[serde(flatten)]
    state: CompetencyState,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    session_id: String,
    stage: crate::context::Stage,
    persona: Persona,
    profile: crate::profile::CandidateProfile,
    question: Option<String>,
    events: Vec<Event>,
    competencies: Vec<CompetencySnapshot>,
    overall_score: f64,
    questions_asked: u32,
    elapsed_ms: i64,
}

#[derive(Debug, Serialize)]
struct TurnResponse {
    stage: crate::context::Stage,
    question: Option<String>,
    events: Vec<Event>,
    competencies: Vec<CompetencySnapshot>,
    overall_score: f64,
    questions_asked: u32,
    elapsed_ms: i64,
    completed: bool,
}

fn competency_snapshots(ctx: &crate::context::InterviewContext) -> Vec<CompetencySnapshot> {
    ctx.competency_order
        .iter()
        .filter_map(|name| {
            ctx.competency_state(name)
                .map(|state| CompetencySnapshot { competency: name.clone(), state: state.clone() })
        })
        .collect()
}

async fn start_session<T, R, C>(
    State(state): State<AppState<T, R, C>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, EngineError>
where
    T: LlmTransport,
    R: RubricStore,
    C: CandidateStore,
{
    let now = Utc::now();
    let rubric = state.rubrics.get_by_interview(&req.interview_id).await?;
    let candidate = state.candidates.get(&req.candidate_id).await?;
    let persona = req.persona.unwrap_or_default();
    let session_id = uuid::Uuid::new_v4().to_string();

    let jd_summary = format!("Interview {}", req.interview_id);
    let outcome = state
        .sessions
        .start(session_id.clone(), &jd_summary, rubric, candidate.clone(), persona.clone(), now)
        .await?;
    let ctx = state.sessions.snapshot(&session_id, now).await?;

    Ok(Json(StartResponse {
        session_id,
        stage: ctx.stage,
        persona,
        profile: candidate,
        question: outcome.question,
        events: ctx.events_since(0),
        competencies: competency_snapshots(&ctx),
        overall_score: ctx.overall_score(),
        questions_asked: ctx.questions_asked,
        elapsed_ms: (now - ctx.started_at).num_milliseconds(),
    }))
}

async fn turn_session<T, R, C>(
    State(state): State<AppState<T, R, C>>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, EngineError>
where
    T: LlmTransport,
    R: RubricStore,
    C: CandidateStore,
{
    let now = Utc::now();
    let before = state.sessions.snapshot(&req.session_id, now).await?;
    let since = before.latest_event_id();

    // `autoGenerate` asks the Candidate Auto-Reply agent to produce the
    // answer at the given competence level instead of trusting the
    // caller-supplied text; `autoSend` is otherwise a no-op flag the
    // client may use to mark a fully automated turn in its own logs.
    let answer = match req.auto_generate {
        Some(level) => state.sessions.auto_reply(&before, level).await?,
        None => {
            if req.answer.trim().is_empty() {
                return Err(EngineError::InvalidPayload("answer must not be empty".to_string()));
            }
            req.answer
        }
    };
    let _ = req.auto_send;

    let TurnOutcome { question, completed } = state.sessions.turn(&req.session_id, answer, now).await?;
    let ctx = state.sessions.snapshot(&req.session_id, now).await?;

    Ok(Json(TurnResponse {
        stage: ctx.stage,
        question,
        events: ctx.events_since(since),
        competencies: competency_snapshots(&ctx),
        overall_score: ctx.overall_score(),
        questions_asked: ctx.questions_asked,
        elapsed_ms: (now - ctx.started_at).num_milliseconds(),
        completed,
    }))
}

/// Maps the error taxonomy onto HTTP status codes per §7: 400 for a
/// malformed request, 401/409/410 for the session lifecycle states, 404
/// when `/sessions/start` names an unknown interview or candidate, 502
/// when the LLM Gateway exhausted its retries, 500 otherwise.
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            EngineError::SessionUnknown(_) => StatusCode::UNAUTHORIZED,
            EngineError::SessionComplete(_) => StatusCode::CONFLICT,
            EngineError::SessionExpired(_) => StatusCode::GONE,
            EngineError::InterviewNotFound(_) | EngineError::CandidateNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::LLMFailure(_) => StatusCode::BAD_GATEWAY,
            EngineError::RouteNotFound { .. }
            | EngineError::ConfigInvalid(_)
            | EngineError::RubricDegraded(_)
            | EngineError::TurnTimeout => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "error": self.reason_code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
