//! Competency Primer agent (§4.3): pre-seeds one project anchor per
//! competency from the resume and JD before the first turn.

use crate::error::EngineError;
use crate::gateway::{LlmGateway, LlmTransport};
use crate::profile::CandidateProfile;
use crate::routes::RouteRegistry;
use crate::schema::PrimerOutput;

/// Placeholder anchor text the Flow Manager falls back to when the primer
/// exhausts its retries (§4.3's failure policy).
pub const DEGRADED_ANCHOR: &str = "Draw on a recent relevant project";

pub async fn prime_anchors<T: LlmTransport>(
    gateway: &LlmGateway<T>,
    routes: &RouteRegistry,
    jd_summary: &str,
    candidate: &CandidateProfile,
    competencies: &[String],
) -> Result<PrimerOutput, EngineError> {
    let route = routes.get("agents", "primer")?;

    let task = format!(
        "Job description summary:\n{}\n\n\
         Candidate resume summary:\n{}\n\
         Highlighted experience:\n{}\n\n\
         Competencies to seed (in order): {}\n\n\
         For each competency, return a concise 1-3 sentence project anchor grounded in the \
         resume where possible. If the resume gives no usable anchor for a competency, invent \
         a realistic hypothetical project instead — never return an empty string for any \
         competency.",
        jd_summary,
        candidate.resume_summary,
        candidate.highlighted_experiences.join("; "),
        competencies.join(", "),
    );

    gateway.call("agents::primer", &task, route).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ChatMessage, ResponseFormat};
    use async_trait::async_trait;
    use std::error::Error;

    struct MockTransport(String);

    #[async_trait]
    impl LlmTransport for MockTransport {
        async fn chat(
            &self,
            _base_url: &str,
            _model: &str,
            _endpoint: &str,
            _messages: &[ChatMessage],
            _format: ResponseFormat,
            _timeout_ms: u64,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            Ok(self.0.clone())
        }
    }

    fn registry() -> RouteRegistry {
        let config = crate::config::EngineConfig::from_toml_str(
            r#"
            [flow]
            warmup_limit = 1
            follow_up_limit = 3
            low_score_streak_limit = 2
            low_score_threshold = 2
            coverage_min_questions = 2
            evaluator_window_messages = 8
            turn_deadline_ms = 20000
            session_timeout_minutes = 30
            checkpoint_interval_minutes = 5
            completion_grace_minutes = 10

            [llm]
            api_key_env_var = "OPENAI_API_KEY"

            [[routes]]
            module = "agents"
            function = "primer"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 2
            response_format = "json_object"
            schema_name = "PrimerOutput"
            "#,
        )
        .unwrap();
        RouteRegistry::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn never_returns_empty_anchors() {
        let transport = MockTransport(
            r#"{"anchors":{"Backend":"Built a resume-sourced payments service."}}"#.to_string(),
        );
        let gateway = LlmGateway::new(transport);
        let registry = registry();
        let candidate = CandidateProfile::new("Ada", "Backend engineer.");
        let out = prime_anchors(
            &gateway,
            &registry,
            "Needs a backend engineer",
            &candidate,
            &["Backend".to_string()],
        )
        .await
        .unwrap();
        assert!(!out.anchors["Backend"].is_empty());
    }
}
