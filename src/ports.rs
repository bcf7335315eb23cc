//! Traits for the collaborators the core consumes but does not own
//! (§6.2): rubric storage and candidate storage. Real persistence is out
//! of scope (§1); this module defines the contract plus small in-memory
//! adapters suitable for embedding and for the test suite.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::profile::CandidateProfile;
use crate::rubric::Rubric;

#[async_trait]
pub trait RubricStore: Send + Sync {
    async fn get_by_interview(&self, interview_id: &str) -> Result<Rubric, EngineError>;
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get(&self, candidate_id: &str) -> Result<CandidateProfile, EngineError>;
}

/// In-memory [`RubricStore`] keyed by interview id.
#[derive(Default)]
pub struct StaticRubricStore {
    rubrics: HashMap<String, Rubric>,
}

impl StaticRubricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rubric(mut self, interview_id: impl Into<String>, rubric: Rubric) -> Self {
        self.rubrics.insert(interview_id.into(), rubric);
        self
    }
}

#[async_trait]
impl RubricStore for StaticRubricStore {
    async fn get_by_interview(&self, interview_id: &str) -> Result<Rubric, EngineError> {
        self.rubrics
            .get(interview_id)
            .cloned()
            .ok_or_else(|| EngineError::InterviewNotFound(interview_id.to_string()))
    }
}

/// In-memory [`CandidateStore`] keyed by candidate id.
#[derive(Default)]
pub struct StaticCandidateStore {
    candidates: HashMap<String, CandidateProfile>,
}

impl StaticCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidate(mut self, candidate_id: impl Into<String>, profile: CandidateProfile) -> Self {
        self.candidates.insert(candidate_id.into(), profile);
        self
    }
}

#[async_trait]
impl CandidateStore for StaticCandidateStore {
    async fn get(&self, candidate_id: &str) -> Result<CandidateProfile, EngineError> {
        self.candidates
            .get(candidate_id)
            .cloned()
            .ok_or_else(|| EngineError::CandidateNotFound(candidate_id.to_string()))
    }
}
