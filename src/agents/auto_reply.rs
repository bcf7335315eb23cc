//! Candidate Auto-Reply agent (§4.8, optional): produces a candidate
//! response at a requested competence level, for end-to-end simulation.

use crate::context::Message;
use crate::error::EngineError;
use crate::gateway::{LlmGateway, LlmTransport};
use crate::routes::RouteRegistry;
use crate::schema::AutoReplyOutput;
use crate::transcript::render_transcript;

pub async fn generate_candidate_reply<T: LlmTransport>(
    gateway: &LlmGateway<T>,
    routes: &RouteRegistry,
    competency: &str,
    targeted_criteria: &[String],
    project_anchor: &str,
    transcript: &[Message],
    candidate_level: u8,
) -> Result<AutoReplyOutput, EngineError> {
    let route = routes.get("agents", "auto_reply")?;

    let quality_guidance = match candidate_level {
        1..=2 => {
            "Answer thinly: omit concrete detail, skip tradeoffs, and stay at a surface level."
        }
        3 => "Answer with reasonable detail but without discussing failure modes or metrics.",
        _ => {
            "Answer thoroughly: include concrete detail, tradeoffs, failure modes, and metrics \
             where relevant."
        }
    };

    let task = format!(
        "You are roleplaying as the candidate in a technical interview, answering at \
         competence level {} out of 5.\nActive competency: {}\nTargeted criteria: {}\n\
         Project anchor: {}\n\n{}\n\nTranscript so far:\n{}\n\n\
         Write the candidate's next answer.",
        candidate_level,
        competency,
        targeted_criteria.join(", "),
        project_anchor,
        quality_guidance,
        render_transcript(transcript),
    );

    gateway.call("agents::auto_reply", &task, route).await
}
