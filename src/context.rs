//! The mutable per-session state: `InterviewContext` and everything it is
//! built from (`Message`, `Event`, `EvaluatorState`, per-competency
//! bookkeeping).
//!
//! The Session Manager owns the single live instance for a session id; the
//! Flow Manager receives it by reference-with-lock, mutates it through
//! small atomic steps, and hands it back. Agents never see or mutate this
//! type directly — they return typed deltas (see `schema`) that the Flow
//! Manager applies here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::profile::{CandidateProfile, Persona};
use crate::rubric::Rubric;

/// The four stages a session moves through. Ordering here is the ordering
/// the state machine enforces: a session's stage index never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Warmup,
    Competency,
    Wrapup,
    Complete,
}

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Interviewer,
    Candidate,
    System,
}

/// One turn of the visible conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub content: String,
    /// Free-form tone label the agent that produced this message chose
    /// (e.g. "warm", "challenging", "closing").
    pub tone: String,
    pub competency: Option<String>,
    pub targeted_criteria: Vec<String>,
    pub project_anchor: Option<String>,
}

impl Message {
    pub fn interviewer(content: impl Into<String>, tone: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Interviewer,
            content: content.into(),
            tone: tone.into(),
            competency: None,
            targeted_criteria: Vec::new(),
            project_anchor: None,
        }
    }

    pub fn candidate(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Candidate,
            content: content.into(),
            tone: String::new(),
            competency: None,
            targeted_criteria: Vec::new(),
            project_anchor: None,
        }
    }

    pub fn with_competency(mut self, competency: Option<String>) -> Self {
        self.competency = competency;
        self
    }

    pub fn with_targeted_criteria(mut self, criteria: Vec<String>) -> Self {
        self.targeted_criteria = criteria;
        self
    }

    pub fn with_project_anchor(mut self, anchor: Option<String>) -> Self {
        self.project_anchor = anchor;
        self
    }
}

/// The kind of a recorded [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    StageEntered,
    Question,
    Answer,
    Evaluation,
    Hint,
    FollowUp,
    Checkpoint,
}

/// An append-only, totally ordered record of something that happened in a
/// session. `event_id` is strictly increasing within a session (invariant
/// I3) and is what lets an HTTP client append new events without dedup
/// (§6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u64,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub competency: Option<String>,
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

/// Per-criterion score produced for the current answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub score: u8,
    pub weight: f64,
    pub rationale: String,
}

/// The evaluator's running assessment of a single competency.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompetencyScore {
    pub total_score: f64,
    pub rubric_filled: bool,
    pub notes: Vec<String>,
    pub rubric_updates: Vec<String>,
    pub criterion_levels: HashMap<String, u8>,
}

/// The evaluator's accumulated state across the whole session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluatorState {
    pub summary: String,
    pub anchors: HashMap<String, Vec<String>>,
    pub scores: HashMap<String, CompetencyScore>,
}

/// Per-competency bookkeeping the Flow Manager maintains. This groups the
/// spec's parallel `competencyProjects` / `competencyCriteria` /
/// `competencyCovered` / `competencyCriterionLevels` /
/// `competencyQuestionCounts` / `competencyLowScores` mappings into one
/// struct keyed by competency name, which is the same information
/// reorganized for locality rather than a change in semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetencyState {
    pub project: String,
    pub criteria: Vec<String>,
    /// Criterion names evidenced so far, insertion order preserved,
    /// case-insensitive deduplicated (invariant I5: a subset of `criteria`).
    pub covered: Vec<String>,
    /// Criterion -> latest observed level (invariant I4: keys are a subset
    /// of `criteria`).
    pub criterion_levels: HashMap<String, u8>,
    pub question_count: u32,
    pub low_score_streak: u32,
}

impl CompetencyState {
    pub fn new(project: impl Into<String>, criteria: Vec<String>) -> Self {
        Self {
            project: project.into(),
            criteria,
            covered: Vec::new(),
            criterion_levels: HashMap::new(),
            question_count: 0,
            low_score_streak: 0,
        }
    }

    /// Records evidence for `criterion`, case-insensitively deduplicated
    /// against what's already covered.
    pub fn mark_covered(&mut self, criterion: &str) {
        let already = self
            .covered
            .iter()
            .any(|c| c.eq_ignore_ascii_case(criterion));
        if !already {
            self.covered.push(criterion.to_string());
        }
    }

    pub fn is_criterion_known(&self, criterion: &str) -> bool {
        self.criteria
            .iter()
            .any(|c| c.eq_ignore_ascii_case(criterion))
    }

    /// Remaining (uncovered) criteria, lowest observed level first, then
    /// rubric order — the prioritization §4.7 step 6 asks the questioner
    /// to follow.
    pub fn remaining_criteria_by_priority(&self) -> Vec<String> {
        let mut remaining: Vec<String> = self
            .criteria
            .iter()
            .filter(|c| !self.covered.iter().any(|done| done.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        remaining.sort_by_key(|c| {
            self.criterion_levels
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(c))
                .map(|(_, v)| *v)
                .unwrap_or(0)
        });
        remaining
    }
}

/// The full mutable state of one interview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewContext {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub last_touched: DateTime<Utc>,

    pub rubric: Rubric,
    pub candidate: CandidateProfile,
    pub persona: Persona,

    pub stage: Stage,
    pub competency_order: Vec<String>,
    pub competency_index: usize,
    pub competencies: HashMap<String, CompetencyState>,

    pub targeted_criteria: Vec<String>,
    pub project_anchor: Option<String>,

    pub warmup_count: u32,
    pub questions_asked: u32,

    pub transcript: Vec<Message>,
    pub events: Vec<Event>,
    pub evaluator_state: EvaluatorState,

    pub last_checkpoint_at: DateTime<Utc>,
    next_event_id: u64,
}

impl InterviewContext {
    pub fn new(
        session_id: impl Into<String>,
        rubric: Rubric,
        candidate: CandidateProfile,
        persona: Persona,
        now: DateTime<Utc>,
    ) -> Self {
        let competency_order = rubric.competency_order();
        let mut competencies = HashMap::new();
        for rubric_entry in &rubric.competencies {
            competencies.insert(
                rubric_entry.competency.clone(),
                CompetencyState::new("", rubric_entry.criterion_names()),
            );
        }
        Self {
            session_id: session_id.into(),
            started_at: now,
            last_touched: now,
            rubric,
            candidate,
            persona,
            stage: Stage::Warmup,
            competency_order,
            competency_index: 0,
            competencies,
            targeted_criteria: Vec::new(),
            project_anchor: None,
            warmup_count: 0,
            questions_asked: 0,
            transcript: Vec::new(),
            events: Vec::new(),
            evaluator_state: EvaluatorState::default(),
            last_checkpoint_at: now,
            next_event_id: 1,
        }
    }

    /// The competency `stage == Competency` should be operating on, per
    /// invariant I2: `None` whenever the stage isn't `Competency`, or once
    /// the index has moved past the last competency.
    pub fn active_competency(&self) -> Option<&str> {
        if self.stage != Stage::Competency {
            return None;
        }
        self.competency_order
            .get(self.competency_index)
            .map(|s| s.as_str())
    }

    pub fn competency_state(&self, competency: &str) -> Option<&CompetencyState> {
        self.competencies.get(competency)
    }

    pub fn competency_state_mut(&mut self, competency: &str) -> Option<&mut CompetencyState> {
        self.competencies.get_mut(competency)
    }

    /// Appends a new event, assigning the next monotonic `event_id` and
    /// stamping `stage`/`competency` from current context state
    /// (invariant I3).
    pub fn push_event(
        &mut self,
        event_type: EventType,
        competency: Option<String>,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> u64 {
        let event_id = self.next_event_id;
        self.next_event_id += 1;
        self.events.push(Event {
            event_id,
            created_at: now,
            stage: self.stage,
            competency,
            event_type,
            payload,
        });
        event_id
    }

    /// Overall score: the weighted mean of `total_score` across
    /// competencies with `rubric_filled == true`, weighting each
    /// competency by its rubric's summed criterion weights, falling back
    /// to a simple (unweighted) mean across any competency carrying a
    /// score at all (§4.7 step 9). Deterministic given the current
    /// snapshot (property P5).
    pub fn overall_score(&self) -> f64 {
        let filled: Vec<(&String, &CompetencyScore)> = self
            .evaluator_state
            .scores
            .iter()
            .filter(|(_, s)| s.rubric_filled)
            .collect();
        if !filled.is_empty() {
            let weight_of = |name: &str| -> f64 {
                self.rubric
                    .get(name)
                    .map(|r| r.criteria.iter().map(|c| c.weight).sum::<f64>())
                    .filter(|w| *w > 0.0)
                    .unwrap_or(1.0)
            };
            let weighted_sum: f64 = filled.iter().map(|(name, s)| weight_of(name) * s.total_score).sum();
            let total_weight: f64 = filled.iter().map(|(name, _)| weight_of(name)).sum();
            return (weighted_sum / total_weight).clamp(0.0, 5.0);
        }
        let any: Vec<&CompetencyScore> = self.evaluator_state.scores.values().collect();
        if any.is_empty() {
            return 0.0;
        }
        let sum: f64 = any.iter().map(|s| s.total_score).sum();
        (sum / any.len() as f64).clamp(0.0, 5.0)
    }

    /// Events with `event_id > since`, in order — the "only the newly
    /// appended ones" slice §6.1 specifies for `/turn` responses.
    pub fn events_since(&self, since: u64) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.event_id > since)
            .cloned()
            .collect()
    }

    pub fn latest_event_id(&self) -> u64 {
        self.events.last().map(|e| e.event_id).unwrap_or(0)
    }
}
