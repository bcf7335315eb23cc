//! Error taxonomy for the interview engine.
//!
//! Mirrors the flat, hand-rolled error enums used throughout the agent
//! toolkit this crate is built on (see `CouncilError` / `OrchestrationError`
//! in a typical `cloudllm`-style crate): one enum, a `Display` impl that
//! writes a short human-readable line per variant, and a blanket
//! `std::error::Error` impl. No `thiserror`.

use std::error::Error;
use std::fmt;

/// Every way a call into the engine can fail.
///
/// Variant names track the taxonomy in the spec's error handling design:
/// `ConfigInvalid` is fatal at startup, `LLMFailure` is what retry-exhausted
/// gateway errors become once they reach the Flow Manager, and the
/// `Session*` variants map directly onto HTTP status codes at the
/// boundary (401/409/410 respectively) when the `http-server` feature is
/// enabled.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// The configuration document failed to parse or failed validation.
    ConfigInvalid(String),
    /// A route name was requested that has no entry in the registry.
    RouteNotFound { module: String, function: String },
    /// The LLM gateway exhausted its retry budget, either on transport
    /// errors/timeouts or on repeated schema-validation failures.
    LLMFailure(String),
    /// A turn was requested for a session id with no matching entry.
    SessionUnknown(String),
    /// A turn was requested for a session that has been idle-evicted.
    SessionExpired(String),
    /// A turn was requested for a session already in `Stage::Complete`
    /// past its read grace period, or where writes are categorically
    /// rejected.
    SessionComplete(String),
    /// The caller supplied a malformed request at the HTTP boundary.
    InvalidPayload(String),
    /// `POST /sessions/start` named an interview id with no registered
    /// rubric.
    InterviewNotFound(String),
    /// `POST /sessions/start` named a candidate id with no registered
    /// profile.
    CandidateNotFound(String),
    /// A competency has no usable criteria; the Flow Manager emits a
    /// `hint` event and advances past it rather than failing the session.
    RubricDegraded(String),
    /// The whole turn exceeded `turnDeadlineMs`.
    TurnTimeout,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ConfigInvalid(msg) => write!(f, "invalid configuration: {}", msg),
            EngineError::RouteNotFound { module, function } => {
                write!(f, "no route registered for {}::{}", module, function)
            }
            EngineError::LLMFailure(msg) => write!(f, "llm call failed: {}", msg),
            EngineError::SessionUnknown(id) => write!(f, "unknown session: {}", id),
            EngineError::SessionExpired(id) => write!(f, "session expired: {}", id),
            EngineError::SessionComplete(id) => write!(f, "session already complete: {}", id),
            EngineError::InvalidPayload(msg) => write!(f, "invalid payload: {}", msg),
            EngineError::InterviewNotFound(id) => write!(f, "interview not found: {}", id),
            EngineError::CandidateNotFound(id) => write!(f, "candidate not found: {}", id),
            EngineError::RubricDegraded(msg) => write!(f, "rubric degraded: {}", msg),
            EngineError::TurnTimeout => write!(f, "turn exceeded its deadline"),
        }
    }
}

impl Error for EngineError {}

/// Short machine-readable reason code surfaced to callers alongside the
/// `Display` message, matching §7's "short reason code and a human-readable
/// message" requirement. Never includes prompt text or provider bodies.
impl EngineError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::ConfigInvalid(_) => "config_invalid",
            EngineError::RouteNotFound { .. } => "route_not_found",
            EngineError::LLMFailure(_) => "llm_failure",
            EngineError::SessionUnknown(_) => "session_unknown",
            EngineError::SessionExpired(_) => "session_expired",
            EngineError::SessionComplete(_) => "session_complete",
            EngineError::InvalidPayload(_) => "invalid_payload",
            EngineError::InterviewNotFound(_) => "interview_not_found",
            EngineError::CandidateNotFound(_) => "candidate_not_found",
            EngineError::RubricDegraded(_) => "rubric_degraded",
            EngineError::TurnTimeout => "turn_timeout",
        }
    }
}
