//! The Flow Manager (§4.7): the state machine, coverage accounting, and
//! transition logic that composes the agents via a small directed graph
//! (§9's "graph orchestration" design note):
//!
//! ```text
//! record_answer -> evaluate -> update_coverage -> decide_transition -> ask_next -> persist
//! ```
//!
//! `decide_transition` returns a tagged [`TransitionDecision`] that drives
//! the conditional edge into `ask_next`, rather than being expressed as a
//! chain of booleans.

use chrono::{DateTime, Utc};

use crate::agents::{auto_reply, evaluator, primer, questioner, warmup};
use crate::config::FlowConfig;
use crate::context::{CompetencyState, EventType, InterviewContext, Message, Speaker, Stage};
use crate::error::EngineError;
use crate::gateway::{LlmGateway, LlmTransport};
use crate::profile::{CandidateProfile, Persona};
use crate::routes::RouteRegistry;
use crate::rubric::Rubric;
use crate::schema::Escalation;
use crate::transcript::bounded_for_evaluator;

/// What `decide_transition` concluded for a competency-stage turn. A
/// tagged variant, per §9, rather than a chain of booleans at the call
/// site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionDecision {
    StayInCompetency,
    AdvanceCompetency,
    EnterWrapup,
}

/// Everything the Flow Manager needs to run the eight-step turn algorithm,
/// in one place: the LLM Gateway, the route registry, and the flow
/// configuration. Constructed once per process and shared across
/// sessions (it holds no per-session state itself).
pub struct FlowManager<T: LlmTransport> {
    gateway: LlmGateway<T>,
    routes: RouteRegistry,
    config: FlowConfig,
}

/// The caller-visible result of a successful turn (or a `start`).
pub struct TurnOutcome {
    pub question: Option<String>,
    pub completed: bool,
}

impl<T: LlmTransport> FlowManager<T> {
    pub fn new(gateway: LlmGateway<T>, routes: RouteRegistry, config: FlowConfig) -> Self {
        Self { gateway, routes, config }
    }

    /// Builds a fresh `InterviewContext`: seeds project anchors via the
    /// Primer agent (falling back to the generic placeholder on exhausted
    /// retries, per §4.3), then emits the first warmup message.
    pub async fn start(
        &self,
        session_id: impl Into<String>,
        jd_summary: &str,
        rubric: Rubric,
        candidate: CandidateProfile,
        persona: Persona,
        now: DateTime<Utc>,
    ) -> Result<(InterviewContext, TurnOutcome), EngineError> {
        let competencies = rubric.competency_order();
        let mut ctx = InterviewContext::new(session_id, rubric, candidate, persona, now);

        let anchors = match primer::prime_anchors(
            &self.gateway,
            &self.routes,
            jd_summary,
            &ctx.candidate,
            &competencies,
        )
        .await
        {
            Ok(out) => out.anchors,
            Err(_) => {
                ctx.push_event(
                    EventType::Hint,
                    None,
                    serde_json::json!({
                        "reason": "primer agent exhausted retries, seeding placeholder anchors"
                    }),
                    now,
                );
                competencies
                    .iter()
                    .map(|c| (c.clone(), primer::DEGRADED_ANCHOR.to_string()))
                    .collect()
            }
        };

        for competency in &competencies {
            if let Some(state) = ctx.competency_state_mut(competency) {
                state.project = anchors
                    .get(competency)
                    .cloned()
                    .unwrap_or_else(|| primer::DEGRADED_ANCHOR.to_string());
            }
        }

        let warmup_out = warmup::next_warmup_message(
            &self.gateway,
            &self.routes,
            &ctx.persona,
            &ctx.candidate,
            &ctx.transcript,
            warmup::WarmupMode::Opening,
        )
        .await?;

        let message = Message::interviewer(warmup_out.content.clone(), "warmup");
        ctx.transcript.push(message);
        ctx.warmup_count += 1;
        ctx.questions_asked += 1;
        ctx.push_event(
            EventType::Question,
            None,
            serde_json::json!({ "content": warmup_out.content }),
            now,
        );

        Ok((
            ctx,
            TurnOutcome { question: Some(warmup_out.content), completed: false },
        ))
    }

    /// Runs one full turn: records the candidate's answer, evaluates it,
    /// updates coverage and stage, and produces the next interviewer
    /// prompt (§4.7's eight-step algorithm). Operates on a working copy
    /// the caller commits only on success — see `SessionManager::with_session`.
    pub async fn turn(
        &self,
        ctx: &mut InterviewContext,
        answer: String,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, EngineError> {
        if ctx.stage == Stage::Complete {
            return Err(EngineError::SessionComplete(ctx.session_id.clone()));
        }

        // Step 1: record the candidate's answer.
        let prior_competency = ctx.active_competency().map(|s| s.to_string());
        let prior_targeted = ctx.targeted_criteria.clone();
        let prior_anchor = ctx.project_anchor.clone();
        ctx.transcript.push(
            Message::candidate(answer.clone())
                .with_competency(prior_competency.clone())
                .with_targeted_criteria(prior_targeted.clone())
                .with_project_anchor(prior_anchor.clone()),
        );
        ctx.push_event(
            EventType::Answer,
            prior_competency.clone(),
            serde_json::json!({ "content": answer }),
            now,
        );

        // Step 2: evaluate, then apply deltas.
        let bounded = bounded_for_evaluator(&ctx.transcript, self.config.evaluator_window_messages);
        let rubric_ref = prior_competency.as_deref().and_then(|c| ctx.rubric.get(c));
        let eval_out = evaluator::evaluate_answer(
            &self.gateway,
            &self.routes,
            &bounded,
            ctx.stage,
            prior_competency.as_deref(),
            rubric_ref,
            &ctx.evaluator_state,
        )
        .await?;
        self.apply_evaluation(ctx, prior_competency.as_deref(), eval_out, now);

        // Steps 3 & 4: mutually exclusive on the stage as it stood before this turn.
        if ctx.stage == Stage::Competency {
            self.advance_if_needed(ctx, now);
        } else if ctx.stage == Stage::Warmup && ctx.warmup_count >= self.config.warmup_limit {
            ctx.stage = Stage::Competency;
            ctx.competency_index = 0;
            self.enter_active_competency(ctx, now);
        }

        // Step 5: wrapup collapses into a closing message and `complete`
        // within the same turn (§4.7 step 5).
        if ctx.stage == Stage::Wrapup {
            let closing = warmup::next_warmup_message(
                &self.gateway,
                &self.routes,
                &ctx.persona,
                &ctx.candidate,
                &ctx.transcript,
                warmup::WarmupMode::Closing,
            )
            .await?;
            ctx.transcript.push(Message::interviewer(closing.content.clone(), "closing"));
            ctx.push_event(
                EventType::Question,
                None,
                serde_json::json!({ "content": closing.content, "closing": true }),
                now,
            );
            ctx.stage = Stage::Complete;
            ctx.push_event(EventType::StageEntered, None, serde_json::json!({ "stage": "complete" }), now);
            self.maybe_checkpoint(ctx, now);
            return Ok(TurnOutcome { question: None, completed: true });
        }

        // Step 6 & 7: ask the next question for whatever stage we're in now.
        let question = match ctx.stage {
            Stage::Warmup => {
                let out = warmup::next_warmup_message(
                    &self.gateway,
                    &self.routes,
                    &ctx.persona,
                    &ctx.candidate,
                    &ctx.transcript,
                    warmup::WarmupMode::Opening,
                )
                .await?;
                ctx.transcript.push(Message::interviewer(out.content.clone(), "warmup"));
                ctx.warmup_count += 1;
                ctx.questions_asked += 1;
                ctx.push_event(
                    EventType::Question,
                    None,
                    serde_json::json!({ "content": out.content }),
                    now,
                );
                Some(out.content)
            }
            Stage::Competency => {
                let competency = ctx
                    .active_competency()
                    .expect("invariant I2: competency stage always has an active competency")
                    .to_string();
                let escalation = self.next_escalation_for(ctx, &competency);
                let remaining = ctx
                    .competency_state(&competency)
                    .map(|s| s.remaining_criteria_by_priority())
                    .unwrap_or_default();
                let anchor = ctx.project_anchor.clone().unwrap_or_default();
                let out = questioner::next_competency_prompt(
                    &self.gateway,
                    &self.routes,
                    &ctx.persona,
                    &competency,
                    &anchor,
                    &remaining,
                    &ctx.transcript,
                    escalation,
                )
                .await?;
                ctx.targeted_criteria = out.metadata.targeted_criteria.clone();
                ctx.transcript.push(
                    Message::interviewer(out.content.clone(), format!("{:?}", escalation))
                        .with_competency(Some(competency.clone()))
                        .with_targeted_criteria(out.metadata.targeted_criteria.clone())
                        .with_project_anchor(Some(anchor)),
                );
                ctx.questions_asked += 1;
                if let Some(state) = ctx.competency_state_mut(&competency) {
                    state.question_count += 1;
                }
                ctx.push_event(
                    EventType::Question,
                    Some(competency),
                    serde_json::json!({ "content": out.content, "escalation": escalation }),
                    now,
                );
                Some(out.content)
            }
            Stage::Wrapup | Stage::Complete => None,
        };

        self.maybe_checkpoint(ctx, now);
        let completed = ctx.stage == Stage::Complete;
        Ok(TurnOutcome { question, completed })
    }

    /// Convenience wrapper around the Candidate Auto-Reply agent (§4.8),
    /// for end-to-end simulation driven by the caller rather than the
    /// state machine itself.
    pub async fn auto_reply(
        &self,
        ctx: &InterviewContext,
        candidate_level: u8,
    ) -> Result<String, EngineError> {
        let competency = ctx.active_competency().unwrap_or_default();
        let anchor = ctx.project_anchor.clone().unwrap_or_default();
        let out = auto_reply::generate_candidate_reply(
            &self.gateway,
            &self.routes,
            competency,
            &ctx.targeted_criteria,
            &anchor,
            &ctx.transcript,
            candidate_level,
        )
        .await?;
        Ok(out.content)
    }

    fn apply_evaluation(
        &self,
        ctx: &mut InterviewContext,
        competency: Option<&str>,
        eval_out: crate::schema::EvaluatorOutput,
        now: DateTime<Utc>,
    ) {
        ctx.evaluator_state.summary = eval_out.summary;

        for (competency_name, bullets) in eval_out.anchors_delta {
            for bullet in &bullets {
                ctx.evaluator_state
                    .anchors
                    .entry(competency_name.clone())
                    .or_default()
                    .push(bullet.text.clone());
                if bullet.replacement {
                    if let Some(state) = ctx.competency_state_mut(&competency_name) {
                        state.project = bullet.text.clone();
                    }
                    if ctx.active_competency() == Some(competency_name.as_str()) {
                        ctx.project_anchor = Some(bullet.text.clone());
                    }
                }
            }
        }

        for (competency_name, notes) in &eval_out.rubric_updates {
            ctx.evaluator_state
                .scores
                .entry(competency_name.clone())
                .or_default()
                .rubric_updates
                .extend(notes.iter().cloned());
            if let Some(state) = ctx.competency_state_mut(competency_name) {
                let known: Vec<String> = state.criteria.clone();
                for criterion in known {
                    let named_explicitly = notes
                        .iter()
                        .any(|note| note.to_lowercase().contains(&criterion.to_lowercase()));
                    if named_explicitly {
                        state.mark_covered(&criterion);
                    }
                }
            }
        }

        let Some(competency_name) = competency else { return };
        let Some(score_out) = eval_out.competency_score else { return };

        let mut hint_events = Vec::new();
        for hint in &score_out.hints {
            hint_events.push(hint.clone());
        }

        if let Some(state) = ctx.competency_state_mut(competency_name) {
            for criterion_score in &score_out.criterion_scores {
                let clamped = criterion_score.score.clamp(1, 5) as u8;
                if !state.is_criterion_known(&criterion_score.criterion) {
                    continue;
                }
                let canonical = state
                    .criteria
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(&criterion_score.criterion))
                    .cloned()
                    .unwrap_or_else(|| criterion_score.criterion.clone());
                state.criterion_levels.insert(canonical.clone(), clamped);
                if clamped >= 1 && !criterion_score.rationale.trim().is_empty() {
                    state.mark_covered(&canonical);
                }
            }

            if score_out.total_score <= self.config.low_score_threshold as f64 {
                state.low_score_streak += 1;
            } else {
                state.low_score_streak = 0;
            }
        }

        let entry = ctx.evaluator_state.scores.entry(competency_name.to_string()).or_default();
        entry.total_score = score_out.total_score.clamp(0.0, 5.0);
        entry.rubric_filled = score_out.rubric_filled;
        entry.notes.extend(score_out.hints.iter().cloned());
        for cs in &score_out.criterion_scores {
            entry.criterion_levels.insert(cs.criterion.clone(), cs.score.clamp(1, 5) as u8);
        }

        for hint in hint_events {
            ctx.push_event(
                EventType::Hint,
                Some(competency_name.to_string()),
                serde_json::json!({ "hint": hint }),
                now,
            );
        }
        if score_out.follow_up_needed {
            ctx.push_event(
                EventType::FollowUp,
                Some(competency_name.to_string()),
                serde_json::json!({ "reason": "evaluator requested a follow-up" }),
                now,
            );
        }
    }

    /// `decide_transition` (§4.7 step 3): evaluated only while
    /// `stage == Competency`.
    fn decide_transition(&self, state: &CompetencyState, is_last_competency: bool) -> TransitionDecision {
        let total = state.criteria.len();
        let covered = state.covered.len();

        let fully_covered = total > 0 && covered >= total;
        let mostly_covered = total > 0
            && covered >= total.saturating_sub(1)
            && state.question_count >= self.config.coverage_min_questions;
        let follow_up_exhausted = state.question_count >= self.config.follow_up_limit;
        let low_score_streak_hit = state.low_score_streak >= self.config.low_score_streak_limit;

        let should_advance = fully_covered || mostly_covered || follow_up_exhausted || low_score_streak_hit;
        match (should_advance, is_last_competency) {
            (false, _) => TransitionDecision::StayInCompetency,
            (true, false) => TransitionDecision::AdvanceCompetency,
            (true, true) => TransitionDecision::EnterWrapup,
        }
    }

    fn advance_if_needed(&self, ctx: &mut InterviewContext, now: DateTime<Utc>) {
        let Some(competency) = ctx.active_competency().map(|s| s.to_string()) else { return };
        let Some(state) = ctx.competency_state(&competency) else { return };

        let low_score_streak_hit = state.low_score_streak >= self.config.low_score_streak_limit;
        let is_last = ctx.competency_index + 1 >= ctx.competency_order.len();
        match self.decide_transition(state, is_last) {
            TransitionDecision::StayInCompetency => {}
            TransitionDecision::AdvanceCompetency => {
                if low_score_streak_hit {
                    ctx.push_event(
                        EventType::Hint,
                        Some(competency.clone()),
                        serde_json::json!({
                            "reason": "low-score streak limit reached, advancing past competency"
                        }),
                        now,
                    );
                }
                ctx.competency_index += 1;
                self.enter_active_competency(ctx, now);
            }
            TransitionDecision::EnterWrapup => {
                if low_score_streak_hit {
                    ctx.push_event(
                        EventType::Hint,
                        Some(competency.clone()),
                        serde_json::json!({
                            "reason": "low-score streak limit reached, advancing past competency"
                        }),
                        now,
                    );
                }
                ctx.stage = Stage::Wrapup;
                ctx.push_event(EventType::StageEntered, None, serde_json::json!({ "stage": "wrapup" }), now);
            }
        }
    }

    /// Activates `competency_order[competency_index]`: seeds
    /// `project_anchor`, clears `targeted_criteria`, and — per §4.3's
    /// `RubricDegraded` policy — skips straight past any competency whose
    /// rubric has no usable criteria, recursing until a usable competency
    /// is found or the order is exhausted (entering wrapup).
    fn enter_active_competency(&self, ctx: &mut InterviewContext, now: DateTime<Utc>) {
        loop {
            let Some(competency) = ctx.active_competency().map(|s| s.to_string()) else { return };
            let has_criteria = ctx
                .competency_state(&competency)
                .map(|s| !s.criteria.is_empty())
                .unwrap_or(false);

            ctx.push_event(
                EventType::StageEntered,
                Some(competency.clone()),
                serde_json::json!({ "stage": "competency" }),
                now,
            );

            if has_criteria {
                ctx.project_anchor = ctx.competency_state(&competency).map(|s| s.project.clone());
                ctx.targeted_criteria = Vec::new();
                return;
            }

            ctx.push_event(
                EventType::Hint,
                Some(competency.clone()),
                serde_json::json!({ "reason": "competency rubric has no usable criteria, skipping" }),
                now,
            );
            ctx.competency_index += 1;
            if ctx.competency_index >= ctx.competency_order.len() {
                ctx.stage = Stage::Wrapup;
                ctx.push_event(EventType::StageEntered, None, serde_json::json!({ "stage": "wrapup" }), now);
                return;
            }
        }
    }

    fn next_escalation_for(&self, ctx: &InterviewContext, competency: &str) -> Escalation {
        let Some(state) = ctx.competency_state(competency) else { return Escalation::Broad };
        if state.question_count == 0 {
            return Escalation::Broad;
        }
        // The hint gate tracks the evaluator's last observed level for the
        // specific criterion the questioner is about to target next, not
        // the competency-wide score: a low score on one criterion must not
        // push a `hint` escalation onto an unrelated criterion.
        let last_low_score = state
            .remaining_criteria_by_priority()
            .first()
            .and_then(|criterion| state.criterion_levels.get(criterion))
            .map(|level| *level <= self.config.low_score_threshold)
            .unwrap_or(false);
        questioner::next_escalation(false, last_low_score, (state.question_count as usize).saturating_sub(1))
    }

    fn maybe_checkpoint(&self, ctx: &mut InterviewContext, now: DateTime<Utc>) {
        let elapsed_minutes = (now - ctx.last_checkpoint_at).num_seconds() as f64 / 60.0;
        if elapsed_minutes >= self.config.checkpoint_interval_minutes {
            ctx.push_event(
                EventType::Checkpoint,
                ctx.active_competency().map(|s| s.to_string()),
                serde_json::json!({ "overallScore": ctx.overall_score() }),
                now,
            );
            ctx.last_checkpoint_at = now;
        }
    }
}

/// Helper used outside `InterviewContext` to stamp the last message's
/// speaker, used by tests asserting P1/P2 style properties end to end.
pub fn last_message_speaker(ctx: &InterviewContext) -> Option<Speaker> {
    ctx.transcript.last().map(|m| m.speaker)
}

/// `overallScore` is always recomputed, never stored stale — see
/// `InterviewContext::overall_score` for the actual formula (§4.7 step 9).
pub fn overall_score(ctx: &InterviewContext) -> f64 {
    ctx.overall_score()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::rubric::{CompetencyRubric, Criterion};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::error::Error;
    use std::sync::Mutex;

    fn full_criterion(name: &str, weight: f64) -> Criterion {
        let mut c = Criterion::new(name, weight);
        for lvl in 1..=5 {
            c = c.with_anchor(lvl, format!("level {}", lvl));
        }
        c
    }

    fn two_competency_rubric() -> Rubric {
        Rubric::new(vec![
            CompetencyRubric::new("Backend", "5+")
                .with_criterion(full_criterion("System design", 0.6))
                .with_criterion(full_criterion("Data modeling", 0.4)),
            CompetencyRubric::new("Leadership", "5+")
                .with_criterion(full_criterion("Mentorship", 1.0)),
        ])
    }

    struct ScriptedTransport {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<&str>) -> Self {
            Self { replies: Mutex::new(replies.into_iter().map(String::from).collect()) }
        }
    }

    #[async_trait]
    impl LlmTransport for ScriptedTransport {
        async fn chat(
            &self,
            _base_url: &str,
            _model: &str,
            _endpoint: &str,
            _messages: &[crate::gateway::ChatMessage],
            _format: crate::gateway::ResponseFormat,
            _timeout_ms: u64,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            let mut queue = self.replies.lock().unwrap();
            Ok(queue.pop_front().expect("scripted transport ran out of replies"))
        }
    }

    fn manager(transport: ScriptedTransport) -> FlowManager<ScriptedTransport> {
        let config = EngineConfig::from_toml_str(
            r#"
            [flow]
            warmup_limit = 1
            follow_up_limit = 3
            low_score_streak_limit = 2
            low_score_threshold = 2
            coverage_min_questions = 1
            evaluator_window_messages = 8
            turn_deadline_ms = 20000
            session_timeout_minutes = 30
            checkpoint_interval_minutes = 1000
            completion_grace_minutes = 10

            [llm]
            api_key_env_var = "OPENAI_API_KEY"

            [[routes]]
            module = "agents"
            function = "primer"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "PrimerOutput"

            [[routes]]
            module = "agents"
            function = "warmup"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "WarmupOutput"

            [[routes]]
            module = "agents"
            function = "questioner"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "QuestionerOutput"

            [[routes]]
            module = "agents"
            function = "evaluator"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "EvaluatorOutput"
            "#,
        )
        .unwrap();
        let routes = RouteRegistry::from_config(&config).unwrap();
        FlowManager::new(LlmGateway::new(transport), routes, config.flow)
    }

    #[tokio::test]
    async fn start_seeds_anchors_and_asks_opening_warmup() {
        let transport = ScriptedTransport::new(vec![
            r#"{"anchors":{"Backend":"A payments ledger","Leadership":"Mentored two juniors"}}"#,
            r#"{"content":"Tell me about a project you're proud of.",
                "metadata":{"stage":"warmup","competency":null,"reasoning":"open",
                "escalation":"broad","followUpPrompt":null,"targetedCriteria":[]}}"#,
        ]);
        let fm = manager(transport);
        let (ctx, outcome) = fm
            .start(
                "sess-1",
                "Needs a senior backend engineer",
                two_competency_rubric(),
                CandidateProfile::new("Ada", "Backend engineer, 8 years."),
                Persona::default(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(ctx.stage, Stage::Warmup);
        assert_eq!(outcome.question.as_deref(), Some("Tell me about a project you're proud of."));
        assert_eq!(ctx.competency_state("Backend").unwrap().project, "A payments ledger");
    }

    #[tokio::test]
    async fn warmup_advances_to_first_competency_after_limit() {
        let transport = ScriptedTransport::new(vec![
            r#"{"anchors":{"Backend":"A payments ledger","Leadership":"Mentored two juniors"}}"#,
            r#"{"content":"Tell me about a project.","metadata":{"stage":"warmup","competency":null,
                "reasoning":"open","escalation":"broad","followUpPrompt":null,"targetedCriteria":[]}}"#,
            r#"{"summary":"warm opener","anchorsDelta":{},"rubricUpdates":{},"competencyScore":null}"#,
            r#"{"content":"Walk me through the system design of that ledger.",
                "metadata":{"stage":"competency","competency":"Backend","reasoning":"probe",
                "escalation":"broad","followUpPrompt":null,"targetedCriteria":["System design"]}}"#,
        ]);
        let fm = manager(transport);
        let (mut ctx, _) = fm
            .start(
                "sess-1",
                "Needs a senior backend engineer",
                two_competency_rubric(),
                CandidateProfile::new("Ada", "Backend engineer, 8 years."),
                Persona::default(),
                Utc::now(),
            )
            .await
            .unwrap();

        let outcome = fm.turn(&mut ctx, "I built a payments ledger.".to_string(), Utc::now()).await.unwrap();
        assert_eq!(ctx.stage, Stage::Competency);
        assert_eq!(ctx.active_competency(), Some("Backend"));
        assert!(!outcome.completed);
        assert!(outcome.question.unwrap().contains("system design"));
    }

    #[tokio::test]
    async fn full_coverage_advances_past_last_competency_into_completion() {
        let transport = ScriptedTransport::new(vec![
            // start(): primer + opening warmup
            r#"{"anchors":{"Backend":"A payments ledger","Leadership":"Mentored two juniors"}}"#,
            r#"{"content":"Tell me about a project.","metadata":{"stage":"warmup","competency":null,
                "reasoning":"open","escalation":"broad","followUpPrompt":null,"targetedCriteria":[]}}"#,
            // turn 1 (warmup answer): evaluate, advance into Backend, ask first competency question
            r#"{"summary":"warm opener","anchorsDelta":{},"rubricUpdates":{},"competencyScore":null}"#,
            r#"{"content":"Walk me through the system design.","metadata":{"stage":"competency",
                "competency":"Backend","reasoning":"probe","escalation":"broad","followUpPrompt":null,
                "targetedCriteria":["System design","Data modeling"]}}"#,
            // turn 2: fully covers Backend, advances straight into Leadership
            r#"{"summary":"strong","anchorsDelta":{},"rubricUpdates":{},
                "competencyScore":{"competency":"Backend","totalScore":4.5,"rubricFilled":true,
                "criterionScores":[{"criterion":"System design","score":5,"weight":0.6,
                "rationale":"covered tradeoffs well"},{"criterion":"Data modeling","score":4,
                "weight":0.4,"rationale":"covered schema choices"}],"hints":[],"followUpNeeded":false}}"#,
            r#"{"content":"Tell me about mentoring a teammate.","metadata":{"stage":"competency",
                "competency":"Leadership","reasoning":"probe","escalation":"broad","followUpPrompt":null,
                "targetedCriteria":["Mentorship"]}}"#,
            // turn 3: fully covers Leadership (the last competency), collapses into wrapup+complete
            r#"{"summary":"strong","anchorsDelta":{},"rubricUpdates":{},
                "competencyScore":{"competency":"Leadership","totalScore":4.0,"rubricFilled":true,
                "criterionScores":[{"criterion":"Mentorship","score":4,"weight":1.0,
                "rationale":"covered a concrete mentee story"}],"hints":[],"followUpNeeded":false}}"#,
            r#"{"content":"Thanks so much for your time today!","metadata":{"stage":"wrapup",
                "competency":null,"reasoning":"close","escalation":"broad","followUpPrompt":null,
                "targetedCriteria":[]}}"#,
        ]);
        let fm = manager(transport);
        let (mut ctx, _) = fm
            .start(
                "sess-1",
                "Needs a senior backend engineer",
                two_competency_rubric(),
                CandidateProfile::new("Ada", "Backend engineer, 8 years."),
                Persona::default(),
                Utc::now(),
            )
            .await
            .unwrap();

        fm.turn(&mut ctx, "I built a payments ledger.".to_string(), Utc::now()).await.unwrap();
        assert_eq!(ctx.active_competency(), Some("Backend"));

        let outcome2 = fm
            .turn(&mut ctx, "We chose eventual consistency and sharded by account id.".to_string(), Utc::now())
            .await
            .unwrap();
        assert_eq!(ctx.active_competency(), Some("Leadership"));
        assert!(!outcome2.completed);

        let outcome3 = fm
            .turn(&mut ctx, "I mentored a junior through their first on-call rotation.".to_string(), Utc::now())
            .await
            .unwrap();
        assert!(outcome3.completed);
        assert_eq!(outcome3.question, None);
        assert_eq!(ctx.stage, Stage::Complete);
        assert!(ctx.transcript.last().unwrap().content.contains("Thanks"));
    }

    #[tokio::test]
    async fn follow_up_limit_advances_even_without_full_coverage() {
        // Every scripted score (3.0) sits above low_score_threshold (2), so
        // the low-score streak never fires; coverage stays at zero
        // throughout, making `follow_up_limit` the only lever that can
        // trigger advance.
        let base_toml = r#"
            [flow]
            warmup_limit = 1
            follow_up_limit = 3
            low_score_streak_limit = 2
            low_score_threshold = 2
            coverage_min_questions = 5
            evaluator_window_messages = 8
            turn_deadline_ms = 20000
            session_timeout_minutes = 30
            checkpoint_interval_minutes = 1000
            completion_grace_minutes = 10

            [llm]
            api_key_env_var = "OPENAI_API_KEY"

            [[routes]]
            module = "agents"
            function = "primer"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "PrimerOutput"

            [[routes]]
            module = "agents"
            function = "warmup"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "WarmupOutput"

            [[routes]]
            module = "agents"
            function = "questioner"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "QuestionerOutput"

            [[routes]]
            module = "agents"
            function = "evaluator"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 1
            response_format = "json_object"
            schema_name = "EvaluatorOutput"
            "#;
        let config = EngineConfig::from_toml_str(base_toml).unwrap();
        let routes = RouteRegistry::from_config(&config).unwrap();

        let transport = ScriptedTransport::new(vec![
            r#"{"anchors":{"Backend":"A payments ledger","Leadership":"Mentored two juniors"}}"#,
            r#"{"content":"Tell me about a project.","metadata":{"stage":"warmup","competency":null,
                "reasoning":"open","escalation":"broad","followUpPrompt":null,"targetedCriteria":[]}}"#,
            r#"{"summary":"warm opener","anchorsDelta":{},"rubricUpdates":{},"competencyScore":null}"#,
            r#"{"content":"Walk me through the system design.","metadata":{"stage":"competency",
                "competency":"Backend","reasoning":"probe","escalation":"broad","followUpPrompt":null,
                "targetedCriteria":["System design","Data modeling"]}}"#,
            // three more answers, none scoring any criteria, exhaust follow_up_limit=3
            r#"{"summary":"vague","anchorsDelta":{},"rubricUpdates":{},
                "competencyScore":{"competency":"Backend","totalScore":3.0,"rubricFilled":false,
                "criterionScores":[],"hints":[],"followUpNeeded":true}}"#,
            r#"{"content":"Can you be more specific about the data model?","metadata":{"stage":"competency",
                "competency":"Backend","reasoning":"probe","escalation":"hint","followUpPrompt":null,
                "targetedCriteria":["Data modeling"]}}"#,
            r#"{"summary":"still vague","anchorsDelta":{},"rubricUpdates":{},
                "competencyScore":{"competency":"Backend","totalScore":3.0,"rubricFilled":false,
                "criterionScores":[],"hints":[],"followUpNeeded":true}}"#,
            r#"{"content":"Can you give a concrete example?","metadata":{"stage":"competency",
                "competency":"Backend","reasoning":"probe","escalation":"why","followUpPrompt":null,
                "targetedCriteria":["Data modeling"]}}"#,
            r#"{"summary":"still vague","anchorsDelta":{},"rubricUpdates":{},
                "competencyScore":{"competency":"Backend","totalScore":3.0,"rubricFilled":false,
                "criterionScores":[],"hints":[],"followUpNeeded":true}}"#,
            r#"{"content":"Tell me about mentoring a teammate.","metadata":{"stage":"competency",
                "competency":"Leadership","reasoning":"probe","escalation":"broad","followUpPrompt":null,
                "targetedCriteria":["Mentorship"]}}"#,
        ]);
        let fm = FlowManager::new(LlmGateway::new(transport), routes, config.flow);
        let (mut ctx, _) = fm
            .start(
                "sess-1",
                "Needs a senior backend engineer",
                two_competency_rubric(),
                CandidateProfile::new("Ada", "Backend engineer, 8 years."),
                Persona::default(),
                Utc::now(),
            )
            .await
            .unwrap();

        fm.turn(&mut ctx, "I built a payments ledger.".to_string(), Utc::now()).await.unwrap();
        for _ in 0..3 {
            fm.turn(&mut ctx, "It's a distributed system.".to_string(), Utc::now()).await.unwrap();
        }
        assert_eq!(ctx.active_competency(), Some("Leadership"));
    }
}
