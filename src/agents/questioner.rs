//! Competency Questioner agent (§4.5): the next interviewer prompt bound
//! to an active competency, project anchor, and remaining criteria.

use crate::agents::persona_preamble;
use crate::context::Message;
use crate::error::EngineError;
use crate::gateway::{LlmGateway, LlmTransport};
use crate::profile::Persona;
use crate::routes::RouteRegistry;
use crate::schema::{Escalation, QuestionerOutput};
use crate::transcript::render_transcript;

/// Escalation guidance for the next prompt: the first prompt in a new
/// competency is always `broad`, `hint` may be inserted when the last
/// score for a targeted criterion was <= 2, and otherwise the questioner
/// cycles `why -> how -> challenge -> edge` (§4.5).
pub fn next_escalation(is_first_prompt_in_competency: bool, last_low_score: bool, cycle_position: usize) -> Escalation {
    if is_first_prompt_in_competency {
        Escalation::Broad
    } else if last_low_score {
        Escalation::Hint
    } else {
        Escalation::after_cycle_position(cycle_position)
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn next_competency_prompt<T: LlmTransport>(
    gateway: &LlmGateway<T>,
    routes: &RouteRegistry,
    persona: &Persona,
    competency: &str,
    project_anchor: &str,
    remaining_criteria: &[String],
    transcript: &[Message],
    escalation: Escalation,
) -> Result<QuestionerOutput, EngineError> {
    let route = routes.get("agents", "questioner")?;

    let task = format!(
        "{}\nActive competency: {}\nProject anchor: {}\nRemaining (not yet covered) criteria, in priority order: {}\n\
         Requested escalation for this prompt: {:?}\n\n\
         Transcript so far:\n{}\n\n\
         Write the next interviewer prompt for this competency, grounded in the project anchor, \
         using the requested escalation style. Name which of the remaining criteria this prompt \
         targets.",
        persona_preamble(persona),
        competency,
        project_anchor,
        remaining_criteria.join(", "),
        escalation,
        render_transcript(transcript),
    );

    gateway.call("agents::questioner", &task, route).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_prompt_in_competency_is_always_broad() {
        assert_eq!(next_escalation(true, true, 2), Escalation::Broad);
    }

    #[test]
    fn low_score_inserts_hint() {
        assert_eq!(next_escalation(false, true, 0), Escalation::Hint);
    }

    #[test]
    fn cycles_through_escalation_modes() {
        assert_eq!(next_escalation(false, false, 0), Escalation::Why);
        assert_eq!(next_escalation(false, false, 1), Escalation::How);
        assert_eq!(next_escalation(false, false, 2), Escalation::Challenge);
        assert_eq!(next_escalation(false, false, 3), Escalation::Edge);
        assert_eq!(next_escalation(false, false, 4), Escalation::Why);
    }
}
