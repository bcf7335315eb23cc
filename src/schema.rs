//! Typed DTOs for every agent's structured output, plus the JSON Schema
//! document sent to the LLM Gateway for each one.
//!
//! Per §9's "dynamic dicts at boundaries" design note, raw `serde_json::Value`
//! maps never cross the agent/Flow-Manager boundary — every agent output is
//! one of the concrete types below, and [`OutputSchema::json_schema`] is
//! what the Gateway forwards to the model so it can be asked to "reply with
//! a single JSON object matching this schema" (§4.1).
//!
//! The builder-style `with_*` methods here follow the same shape as
//! `ToolMetadata`/`ToolParameter` in a typical tool-calling protocol
//! module: plain structs assembled field by field, favoring tests and
//! adapters over a fully general schema DSL.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Implemented by every agent output DTO: produces the JSON Schema
/// document describing its own shape, for inclusion in the Gateway's
/// system hint.
pub trait OutputSchema {
    fn json_schema() -> Value;
}

/// Output of the Competency Primer agent: one project anchor per
/// competency (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimerOutput {
    pub anchors: HashMap<String, String>,
}

impl OutputSchema for PrimerOutput {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "anchors": {
                    "type": "object",
                    "description": "competency name -> 1-3 sentence project anchor, never empty",
                    "additionalProperties": { "type": "string", "minLength": 1 }
                }
            },
            "required": ["anchors"]
        })
    }
}

/// The rhetorical mode of an interviewer prompt within a competency
/// (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    Broad,
    Why,
    How,
    Challenge,
    Hint,
    Edge,
}

impl Escalation {
    /// The `why -> how -> challenge -> edge` cycle §4.5 specifies for
    /// every competency prompt after the first.
    pub const CYCLE: [Escalation; 4] =
        [Escalation::Why, Escalation::How, Escalation::Challenge, Escalation::Edge];

    pub fn after_cycle_position(position: usize) -> Escalation {
        Self::CYCLE[position % Self::CYCLE.len()]
    }
}

/// Shared metadata block every interviewer-message-producing agent
/// returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata {
    pub stage: String,
    pub competency: Option<String>,
    pub reasoning: String,
    pub escalation: Escalation,
    pub follow_up_prompt: Option<String>,
    #[serde(default)]
    pub targeted_criteria: Vec<String>,
}

/// Output of the Warmup agent (§4.4), also reused in "closing mode" for
/// the wrap-up message (§4.7 step 5, §9's open question on wrap-up
/// authorship).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupOutput {
    pub content: String,
    pub metadata: PromptMetadata,
}

impl OutputSchema for WarmupOutput {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "minLength": 1 },
                "metadata": {
                    "type": "object",
                    "properties": {
                        "stage": { "type": "string" },
                        "competency": { "type": ["string", "null"] },
                        "reasoning": { "type": "string" },
                        "escalation": { "type": "string", "enum": ["broad"] },
                        "followUpPrompt": { "type": ["string", "null"] },
                        "targetedCriteria": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["stage", "reasoning", "escalation"]
                }
            },
            "required": ["content", "metadata"]
        })
    }
}

/// Output of the Competency Questioner agent (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionerOutput {
    pub content: String,
    pub metadata: PromptMetadata,
}

impl OutputSchema for QuestionerOutput {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "minLength": 1 },
                "metadata": {
                    "type": "object",
                    "properties": {
                        "stage": { "type": "string", "enum": ["competency"] },
                        "competency": { "type": "string" },
                        "reasoning": { "type": "string" },
                        "escalation": {
                            "type": "string",
                            "enum": ["broad", "why", "how", "challenge", "hint", "edge"]
                        },
                        "followUpPrompt": { "type": ["string", "null"] },
                        "targetedCriteria": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["stage", "competency", "reasoning", "escalation", "targetedCriteria"]
                }
            },
            "required": ["content", "metadata"]
        })
    }
}

/// One bullet the Evaluator proposes appending to a competency's project
/// anchor history. `replacement` resolves §9's open question on anchor
/// refinement explicitly: only a bullet marked `replacement = true` may
/// become the new active `project_anchor`; by default the primer-seeded
/// anchor stays authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorBullet {
    pub text: String,
    #[serde(default)]
    pub replacement: bool,
}

/// Per-criterion score emitted by the Evaluator (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScoreOutput {
    pub criterion: String,
    pub score: i64,
    pub weight: f64,
    pub rationale: String,
}

/// The competency-scoped scoring block, only present while
/// `stage == competency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyScoreOutput {
    pub competency: String,
    pub total_score: f64,
    pub rubric_filled: bool,
    pub criterion_scores: Vec<CriterionScoreOutput>,
    #[serde(default)]
    pub hints: Vec<String>,
    pub follow_up_needed: bool,
}

/// Output of the Evaluator agent (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorOutput {
    pub summary: String,
    #[serde(default)]
    pub anchors_delta: HashMap<String, Vec<AnchorBullet>>,
    #[serde(default)]
    pub rubric_updates: HashMap<String, Vec<String>>,
    pub competency_score: Option<CompetencyScoreOutput>,
}

impl OutputSchema for EvaluatorOutput {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "anchorsDelta": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "text": { "type": "string" },
                                "replacement": { "type": "boolean" }
                            },
                            "required": ["text"]
                        }
                    }
                },
                "rubricUpdates": {
                    "type": "object",
                    "additionalProperties": { "type": "array", "items": { "type": "string" } }
                },
                "competencyScore": {
                    "type": ["object", "null"],
                    "properties": {
                        "competency": { "type": "string" },
                        "totalScore": { "type": "number", "minimum": 0, "maximum": 5 },
                        "rubricFilled": { "type": "boolean" },
                        "criterionScores": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "criterion": { "type": "string" },
                                    "score": { "type": "integer" },
                                    "weight": { "type": "number" },
                                    "rationale": { "type": "string" }
                                },
                                "required": ["criterion", "score", "rationale"]
                            }
                        },
                        "hints": { "type": "array", "items": { "type": "string" } },
                        "followUpNeeded": { "type": "boolean" }
                    },
                    "required": ["competency", "totalScore", "rubricFilled", "criterionScores", "followUpNeeded"]
                }
            },
            "required": ["summary"]
        })
    }
}

/// Output of the (optional) Candidate Auto-Reply agent (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyOutput {
    pub content: String,
}

impl OutputSchema for AutoReplyOutput {
    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "minLength": 1 }
            },
            "required": ["content"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_cycle_wraps_around() {
        assert_eq!(Escalation::after_cycle_position(0), Escalation::Why);
        assert_eq!(Escalation::after_cycle_position(4), Escalation::Why);
        assert_eq!(Escalation::after_cycle_position(3), Escalation::Edge);
    }

    #[test]
    fn schemas_are_well_formed_objects() {
        for schema in [
            PrimerOutput::json_schema(),
            WarmupOutput::json_schema(),
            QuestionerOutput::json_schema(),
            EvaluatorOutput::json_schema(),
            AutoReplyOutput::json_schema(),
        ] {
            assert_eq!(schema["type"], "object");
        }
    }
}
