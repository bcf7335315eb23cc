//! Warmup agent (§4.4): the opening interviewer message, and — in
//! "closing mode" — the wrap-up closer (§4.7 step 5, §9's open question on
//! wrap-up authorship: the spec treats this as a single agent with two
//! modes rather than a dedicated wrapup agent).

use crate::agents::persona_preamble;
use crate::context::Message;
use crate::error::EngineError;
use crate::gateway::{LlmGateway, LlmTransport};
use crate::profile::{CandidateProfile, Persona};
use crate::routes::RouteRegistry;
use crate::schema::WarmupOutput;
use crate::transcript::render_transcript;

/// Whether the Warmup agent is opening the interview or closing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupMode {
    Opening,
    Closing,
}

pub async fn next_warmup_message<T: LlmTransport>(
    gateway: &LlmGateway<T>,
    routes: &RouteRegistry,
    persona: &Persona,
    candidate: &CandidateProfile,
    transcript: &[Message],
    mode: WarmupMode,
) -> Result<WarmupOutput, EngineError> {
    let route = routes.get("agents", "warmup")?;

    let instruction = match mode {
        WarmupMode::Opening => {
            "Open the interview. Set a welcoming tone and invite the candidate to describe a \
             broad recent project in their own words. Do not ask about any specific competency \
             yet — this is the broad opening exchange."
        }
        WarmupMode::Closing => {
            "The interview is complete. Deliver a short, warm closing message thanking the \
             candidate and letting them know what happens next. Do not ask a new question."
        }
    };

    let task = format!(
        "{}\nCandidate: {} ({} years of experience)\nResume summary: {}\n\n\
         Transcript so far:\n{}\n\n{}",
        persona_preamble(persona),
        candidate.candidate_name,
        candidate.experience_years,
        candidate.resume_summary,
        render_transcript(transcript),
        instruction,
    );

    gateway.call("agents::warmup", &task, route).await
}
