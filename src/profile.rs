//! Read-only inputs to a session: the candidate's profile and the
//! interviewer persona. Both are supplied at `start` time and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};

/// The candidate being interviewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate_name: String,
    pub resume_summary: String,
    pub experience_years: f32,
    pub highlighted_experiences: Vec<String>,
}

impl CandidateProfile {
    pub fn new(candidate_name: impl Into<String>, resume_summary: impl Into<String>) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            resume_summary: resume_summary.into(),
            experience_years: 0.0,
            highlighted_experiences: Vec::new(),
        }
    }

    pub fn with_experience_years(mut self, years: f32) -> Self {
        self.experience_years = years;
        self
    }

    pub fn with_highlighted_experience(mut self, bullet: impl Into<String>) -> Self {
        self.highlighted_experiences.push(bullet.into());
        self
    }
}

/// Interviewer tone and delivery style. Influences prompt composition in
/// every agent but never the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub probing_style: String,
    pub hint_style: String,
    pub encouragement: String,
}

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probing_style: "direct but curious".to_string(),
            hint_style: "a gentle nudge toward the missing detail".to_string(),
            encouragement: "warm, brief acknowledgements".to_string(),
        }
    }
}

impl Default for Persona {
    /// A neutral, general-purpose technical interviewer persona.
    fn default() -> Self {
        Persona::new("Technical Interviewer")
    }
}
