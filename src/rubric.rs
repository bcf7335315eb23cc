//! The scoring rubric: the read-only artifact the Flow Manager and the
//! Evaluator agent score candidate answers against.
//!
//! Shaped after the builder-style metadata types in a typical tool-calling
//! protocol module (`ToolMetadata` / `ToolParameter`): plain data with a
//! handful of `with_*` builders for ergonomic construction in tests and in
//! adapters that translate an upstream rubric-generation service's output
//! into this crate's types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One level-specific description for a criterion, levels 1..=5.
pub type AnchorLevel = u8;

/// A single scoring criterion within a competency's rubric.
///
/// Invariant: `anchors` has exactly five entries, keyed `1..=5`. Validated
/// by [`Rubric::validate`], never enforced lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub weight: f64,
    /// Level (1..=5) -> anchor text describing an answer at that level.
    pub anchors: BTreeMap<AnchorLevel, String>,
}

impl Criterion {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            anchors: BTreeMap::new(),
        }
    }

    pub fn with_anchor(mut self, level: AnchorLevel, text: impl Into<String>) -> Self {
        self.anchors.insert(level, text.into());
        self
    }

    fn has_all_five_levels(&self) -> bool {
        (1..=5).all(|lvl| self.anchors.contains_key(&lvl))
    }
}

/// Per-competency scoring rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyRubric {
    pub competency: String,
    pub band: String,
    pub band_notes: Vec<String>,
    pub criteria: Vec<Criterion>,
    pub red_flags: Vec<String>,
    pub evidence: Vec<String>,
    pub min_pass_score: f64,
}

impl CompetencyRubric {
    pub fn new(competency: impl Into<String>, band: impl Into<String>) -> Self {
        Self {
            competency: competency.into(),
            band: band.into(),
            band_notes: Vec::new(),
            criteria: Vec::new(),
            red_flags: Vec::new(),
            evidence: Vec::new(),
            min_pass_score: 0.0,
        }
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Criterion names in rubric order, case preserved.
    pub fn criterion_names(&self) -> Vec<String> {
        self.criteria.iter().map(|c| c.name.clone()).collect()
    }

    /// Case-insensitive exact lookup, per §9's "do not attempt fuzzy
    /// semantic matching" design note.
    pub fn find_criterion(&self, name: &str) -> Option<&Criterion> {
        self.criteria
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn weights_sum_positive(&self) -> bool {
        self.criteria.iter().map(|c| c.weight).sum::<f64>() > 0.0
    }
}

/// The full rubric produced by the (externally owned) rubric generator:
/// one [`CompetencyRubric`] per competency, in the display order the
/// interview will follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub competencies: Vec<CompetencyRubric>,
}

impl Rubric {
    pub fn new(competencies: Vec<CompetencyRubric>) -> Self {
        Self { competencies }
    }

    pub fn competency_order(&self) -> Vec<String> {
        self.competencies.iter().map(|c| c.competency.clone()).collect()
    }

    pub fn get(&self, competency: &str) -> Option<&CompetencyRubric> {
        self.competencies
            .iter()
            .find(|c| c.competency.eq_ignore_ascii_case(competency))
    }

    /// Validates the invariants from §3: every criterion has exactly five
    /// anchor levels, and each competency's criterion weights sum to a
    /// positive number. Returns the names of competencies that fail
    /// validation rather than erroring the whole rubric, so the caller can
    /// apply §7's `RubricDegraded` policy per competency.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut degraded = Vec::new();
        for c in &self.competencies {
            let all_criteria_complete = c.criteria.iter().all(|crit| crit.has_all_five_levels());
            if c.criteria.is_empty() || !all_criteria_complete || !c.weights_sum_positive() {
                degraded.push(c.competency.clone());
            }
        }
        if degraded.is_empty() {
            Ok(())
        } else {
            Err(degraded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_criterion(name: &str, weight: f64) -> Criterion {
        let mut c = Criterion::new(name, weight);
        for lvl in 1..=5 {
            c = c.with_anchor(lvl, format!("level {}", lvl));
        }
        c
    }

    #[test]
    fn validate_flags_incomplete_anchors() {
        let rubric = Rubric::new(vec![CompetencyRubric::new("Distributed Systems", "5+")
            .with_criterion(Criterion::new("Consistency tradeoffs", 1.0))]);
        assert!(rubric.validate().is_err());
    }

    #[test]
    fn validate_passes_complete_rubric() {
        let rubric = Rubric::new(vec![CompetencyRubric::new("Distributed Systems", "5+")
            .with_criterion(full_criterion("Consistency tradeoffs", 0.6))
            .with_criterion(full_criterion("Failure handling", 0.4))]);
        assert!(rubric.validate().is_ok());
    }

    #[test]
    fn find_criterion_is_case_insensitive_exact() {
        let rubric = CompetencyRubric::new("API Design", "3-5")
            .with_criterion(full_criterion("Backwards Compatibility", 1.0));
        assert!(rubric.find_criterion("backwards compatibility").is_some());
        assert!(rubric.find_criterion("backwards compat").is_none());
    }
}
