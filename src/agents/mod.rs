//! The five collaborating agents (§4.3–4.6, §4.8).
//!
//! Each agent is a plain `(typed input) -> (typed output)` async function
//! that composes a prompt template, calls the [`crate::gateway::LlmGateway`],
//! and returns one of the structured [`crate::schema`] DTOs. Per §9's
//! "agents over inheritance" design note, there is no shared base type:
//! polymorphism here is by capability (produce the next interviewer
//! message vs. score an answer), not by class hierarchy.

pub mod auto_reply;
pub mod evaluator;
pub mod primer;
pub mod questioner;
pub mod warmup;

use crate::profile::Persona;

/// Shared prompt scaffolding: every agent's system framing opens with the
/// persona the same way a typical multi-agent council augments its base
/// system prompt with an agent's identity and tone before the task-specific
/// instructions.
pub(crate) fn persona_preamble(persona: &Persona) -> String {
    format!(
        "You are {}, a technical interviewer.\nProbing style: {}\nHint style: {}\nEncouragement: {}\n",
        persona.name, persona.probing_style, persona.hint_style, persona.encouragement
    )
}
