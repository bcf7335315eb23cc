//! The Session Manager (§4.9, synthesized from §2's component table and
//! §5's concurrency model): owns the registry of live sessions and the
//! per-session lock that gives `FlowManager::turn` its atomic,
//! commit-on-success semantics.
//!
//! Shaped after `Agent`'s `tool_registry: Arc<RwLock<ToolRegistry>>` field:
//! one outer `RwLock` guards the registry itself (so sessions can be added
//! and swept concurrently), and each session gets its own inner
//! `tokio::sync::Mutex<InterviewContext>` so two turns on two different
//! sessions never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::config::FlowConfig;
use crate::context::{InterviewContext, Stage};
use crate::error::EngineError;
use crate::flow::{FlowManager, TurnOutcome};
use crate::gateway::LlmTransport;
use crate::profile::{CandidateProfile, Persona};
use crate::rubric::Rubric;

struct SessionEntry {
    ctx: Mutex<InterviewContext>,
}

/// Owns every live `InterviewContext` and serializes access to each one.
/// `FlowManager` itself holds no session state — this is the only
/// component that does.
pub struct SessionManager<T: LlmTransport> {
    flow: FlowManager<T>,
    config: FlowConfig,
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl<T: LlmTransport> SessionManager<T> {
    pub fn new(flow: FlowManager<T>, config: FlowConfig) -> Self {
        Self { flow, config, sessions: RwLock::new(HashMap::new()) }
    }

    /// Starts a new session, running the Primer and the opening Warmup
    /// message, and registers it under `session_id`.
    pub async fn start(
        &self,
        session_id: impl Into<String>,
        jd_summary: &str,
        rubric: Rubric,
        candidate: CandidateProfile,
        persona: Persona,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, EngineError> {
        let session_id = session_id.into();
        let (ctx, outcome) =
            self.flow.start(session_id.clone(), jd_summary, rubric, candidate, persona, now).await?;

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id, Arc::new(SessionEntry { ctx: Mutex::new(ctx) }));
        Ok(outcome)
    }

    /// Runs one turn for `session_id`. The Flow Manager operates on a
    /// working copy; only a successful turn is committed back into the
    /// registry (§5/§7's rollback-on-failure policy) — a failed turn
    /// leaves the stored context exactly as it was before the call. The
    /// whole call is bounded by `turnDeadlineMs`; a turn that runs past it
    /// surfaces as `EngineError::TurnTimeout` and is discarded exactly like
    /// any other failed turn.
    pub async fn turn(
        &self,
        session_id: &str,
        answer: String,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, EngineError> {
        let entry = self.session_entry(session_id).await?;
        let mut guard = entry.ctx.lock().await;

        self.reject_if_expired(&guard, session_id, now)?;

        let mut working_copy = guard.clone();
        let deadline = Duration::from_millis(self.config.turn_deadline_ms);
        match tokio::time::timeout(deadline, self.flow.turn(&mut working_copy, answer, now)).await {
            Ok(Ok(outcome)) => {
                working_copy.last_touched = now;
                *guard = working_copy;
                Ok(outcome)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EngineError::TurnTimeout),
        }
    }

    /// Returns a read-only copy of a session's current state, for status
    /// polling or rendering a response without advancing the turn.
    pub async fn snapshot(&self, session_id: &str, now: DateTime<Utc>) -> Result<InterviewContext, EngineError> {
        let entry = self.session_entry(session_id).await?;
        let guard = entry.ctx.lock().await;
        self.reject_if_expired(&guard, session_id, now)?;
        Ok(guard.clone())
    }

    /// Thin passthrough to the Candidate Auto-Reply agent (§4.8), for
    /// callers driving end-to-end simulation from outside the turn loop
    /// (e.g. the HTTP surface's `autoGenerate` request field).
    pub async fn auto_reply(&self, ctx: &InterviewContext, candidate_level: u8) -> Result<String, EngineError> {
        self.flow.auto_reply(ctx, candidate_level).await
    }

    /// Evicts idle sessions past `sessionTimeoutMinutes`, and completed
    /// sessions past `completionGraceMinutes` (§5). Returns the number of
    /// sessions removed. Intended to be called periodically by the host
    /// process, not from within a turn.
    pub async fn sweep_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();
        for (session_id, entry) in sessions.iter() {
            let guard = entry.ctx.lock().await;
            if self.is_expired(&guard, now) {
                expired.push(session_id.clone());
            }
        }
        for session_id in &expired {
            sessions.remove(session_id);
        }
        expired.len()
    }

    async fn session_entry(&self, session_id: &str) -> Result<Arc<SessionEntry>, EngineError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionUnknown(session_id.to_string()))
    }

    fn is_expired(&self, ctx: &InterviewContext, now: DateTime<Utc>) -> bool {
        let idle_minutes = (now - ctx.last_touched).num_seconds() as f64 / 60.0;
        if ctx.stage == Stage::Complete {
            idle_minutes > self.config.completion_grace_minutes
        } else {
            idle_minutes > self.config.session_timeout_minutes
        }
    }

    fn reject_if_expired(
        &self,
        ctx: &InterviewContext,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.is_expired(ctx, now) {
            return Err(EngineError::SessionExpired(session_id.to_string()));
        }
        Ok(())
    }
}
