//! Process-wide, read-only route registry (§4.2).
//!
//! Built once from the parsed [`crate::config::EngineConfig`] and injected
//! into every caller; no global mutable state. Shaped after a typical
//! tool-calling protocol's `ToolRegistry`: an immutable `HashMap` wrapped
//! in a constructor that fails loudly on bad input rather than panicking
//! lazily on lookup.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gateway::LlmRoute;

/// `(module, function)` -> route. Construction is the only place this can
/// fail; every subsequent [`RouteRegistry::get`] call is infallible lookup
/// logic over already-validated data.
pub struct RouteRegistry {
    routes: HashMap<(String, String), LlmRoute>,
}

impl RouteRegistry {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut routes = HashMap::new();
        for entry in &config.routes {
            let key = (entry.module.clone(), entry.function.clone());
            if routes.contains_key(&key) {
                return Err(EngineError::ConfigInvalid(format!(
                    "duplicate route entry for {}::{}",
                    entry.module, entry.function
                )));
            }
            routes.insert(key, entry.to_route());
        }
        Ok(Self { routes })
    }

    pub fn get(&self, module: &str, function: &str) -> Result<&LlmRoute, EngineError> {
        self.routes
            .get(&(module.to_string(), function.to_string()))
            .ok_or_else(|| EngineError::RouteNotFound {
                module: module.to_string(),
                function: function.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    const CONFIG: &str = r#"
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
    "#;

    #[test]
    fn looks_up_registered_route() {
        let config = EngineConfig::from_toml_str(CONFIG).unwrap();
        let registry = RouteRegistry::from_config(&config).unwrap();
        assert!(registry.get("agents", "evaluator").is_ok());
    }

    #[test]
    fn missing_route_is_an_error() {
        let config = EngineConfig::from_toml_str(CONFIG).unwrap();
        let registry = RouteRegistry::from_config(&config).unwrap();
        assert!(registry.get("agents", "primer").is_err());
    }
}
