//! Transcript shaping for agent prompts.
//!
//! The evaluator's input transcript must not grow without bound as a
//! session progresses (§4.7: "the evaluator input transcript is trimmed to
//! the most recent `evaluatorWindowMessages` plus the opening warmup
//! exchange"). This mirrors the sliding-window eviction an `LLMSession`
//! applies to keep a conversation under a token budget, adapted here to a
//! message-count budget since that's what the spec's config field
//! (`evaluatorWindowMessages`) actually bounds.

use crate::context::Message;

/// Returns the bounded slice of `transcript` that should be shown to the
/// Evaluator agent: the opening warmup exchange (first interviewer message
/// and, if present, the first candidate reply) followed by the most recent
/// `window` messages, without duplicating any message that appears in
/// both halves.
pub fn bounded_for_evaluator(transcript: &[Message], window: usize) -> Vec<Message> {
    if transcript.len() <= window {
        return transcript.to_vec();
    }

    let opening_len = transcript.len().min(2);
    let opening = &transcript[..opening_len];

    let recent_start = transcript.len().saturating_sub(window);
    let recent = &transcript[recent_start.max(opening_len)..];

    let mut bounded = Vec::with_capacity(opening.len() + recent.len());
    bounded.extend_from_slice(opening);
    bounded.extend_from_slice(recent);
    bounded
}

/// Renders a transcript slice into a single prompt-ready block, speaker by
/// speaker, in order. Plain text rather than a DTO: this crosses into
/// prompt composition, never a module boundary the spec asks to be typed.
pub fn render_transcript(transcript: &[Message]) -> String {
    transcript
        .iter()
        .map(|m| format!("{:?}: {}", m.speaker, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
