//! Evaluator agent (§4.6): scores the latest candidate answer against
//! rubric criteria and proposes anchor/rubric deltas.

use crate::context::{EvaluatorState, Message, Stage};
use crate::error::EngineError;
use crate::gateway::{LlmGateway, LlmTransport};
use crate::routes::RouteRegistry;
use crate::rubric::CompetencyRubric;
use crate::schema::EvaluatorOutput;
use crate::transcript::render_transcript;

#[allow(clippy::too_many_arguments)]
pub async fn evaluate_answer<T: LlmTransport>(
    gateway: &LlmGateway<T>,
    routes: &RouteRegistry,
    bounded_transcript: &[Message],
    stage: Stage,
    competency: Option<&str>,
    rubric: Option<&CompetencyRubric>,
    prior_state: &EvaluatorState,
) -> Result<EvaluatorOutput, EngineError> {
    let route = routes.get("agents", "evaluator")?;

    let rubric_block = match rubric {
        Some(r) => format!(
            "Rubric for {} (band {}, min pass score {}):\n{}",
            r.competency,
            r.band,
            r.min_pass_score,
            r.criteria
                .iter()
                .map(|c| format!(
                    "- {} (weight {}): {}",
                    c.name,
                    c.weight,
                    c.anchors
                        .iter()
                        .map(|(lvl, text)| format!("[{}] {}", lvl, text))
                        .collect::<Vec<_>>()
                        .join(" ")
                ))
                .collect::<Vec<_>>()
                .join("\n")
        ),
        None => "No competency is active; this is a warmup/wrapup turn.".to_string(),
    };

    let task = format!(
        "Stage: {:?}\nActive competency: {:?}\n{}\n\nPrior evaluator summary: {}\n\n\
         Transcript (bounded window):\n{}\n\n\
         Score the candidate's latest answer. For every criterion you can support with \
         evidence, report an integer level 1-5 and a one-sentence rationale. Only include a \
         `competencyScore` block while a competency is active.",
        stage,
        competency,
        rubric_block,
        prior_state.summary,
        render_transcript(bounded_transcript),
    );

    gateway.call("agents::evaluator", &task, route).await
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
            function = "evaluator"
            base_url = "https://api.openai.com"
            model = "gpt-4o-mini"
            endpoint = "/v1/chat/completions"
            timeout_ms = 20000
            max_retries = 2
            response_format = "json_object"
            schema_name = "EvaluatorOutput"
            "#,
        )
        .unwrap();
        RouteRegistry::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn parses_competency_score_block() {
        let transport = MockTransport(
            r#"{"summary":"solid answer","anchorsDelta":{},"rubricUpdates":{},
                "competencyScore":{"competency":"Backend","totalScore":4.0,"rubricFilled":true,
                "criterionScores":[{"criterion":"System design","score":4,"weight":1.0,
                "rationale":"covered tradeoffs"}],"hints":[],"followUpNeeded":false}}"#
                .to_string(),
        );
        let gateway = LlmGateway::new(transport);
        let registry = registry();
        let out = evaluate_answer(
            &gateway,
            &registry,
            &[],
            Stage::Competency,
            Some("Backend"),
            None,
            &EvaluatorState::default(),
        )
        .await
        .unwrap();
        let score = out.competency_score.unwrap();
        assert_eq!(score.total_score, 4.0);
        assert!(score.rubric_filled);
    }
}
