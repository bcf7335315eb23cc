//! Process-wide configuration document (§6.3).
//!
//! A single typed document loaded once and validated eagerly: malformed or
//! out-of-range config fails application startup rather than surfacing as
//! a runtime error later (`EngineError::ConfigInvalid`). Parsed with
//! `toml` (imported from the `reflex` example in the retrieval pack — the
//! agent toolkit this crate is built on takes configuration as plain Rust
//! structs assembled by the caller and never introduces a file format of
//! its own).

use serde::Deserialize;
use std::path::Path;

use crate::error::EngineError;
use crate::gateway::{LlmRoute, ResponseFormat};

/// Tunables for the Flow Manager's state machine (§4.7, §6.3).
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    pub warmup_limit: u32,
    pub follow_up_limit: u32,
    pub low_score_streak_limit: u32,
    pub low_score_threshold: u8,
    pub coverage_min_questions: u32,
    pub evaluator_window_messages: usize,
    pub turn_deadline_ms: u64,
    pub session_timeout_minutes: f64,
    pub checkpoint_interval_minutes: f64,
    /// How long a `complete` session stays readable before full eviction.
    /// Not named in the distilled spec's config field list, but required
    /// by §5's "read for a configurable grace period" rule — see
    /// `SPEC_FULL.md` §6.3.
    pub completion_grace_minutes: f64,
}

impl FlowConfig {
    fn validate(&self) -> Result<(), String> {
        if self.warmup_limit < 1 {
            return Err("flow.warmup_limit must be >= 1".into());
        }
        if self.follow_up_limit < 1 {
            return Err("flow.follow_up_limit must be >= 1".into());
        }
        if self.low_score_streak_limit < 1 {
            return Err("flow.low_score_streak_limit must be >= 1".into());
        }
        if !(1..=5).contains(&self.low_score_threshold) {
            return Err("flow.low_score_threshold must be within 1..=5".into());
        }
        if self.evaluator_window_messages < 4 {
            return Err("flow.evaluator_window_messages must be >= 4".into());
        }
        Ok(())
    }
}

/// Names the environment variable holding the LLM credential (§6.4); the
/// key value itself is never stored here.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub api_key_env_var: String,
}

/// One entry of the route registry's source table: `(module, function)` ->
/// [`LlmRoute`] plus the schema name it was registered against.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub module: String,
    pub function: String,
    pub base_url: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub response_format: ResponseFormat,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub schema_name: String,
}

impl RouteEntry {
    pub fn to_route(&self) -> LlmRoute {
        LlmRoute {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            response_format: self.response_format,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// The whole configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub flow: FlowConfig,
    pub llm: LlmSettings,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;
        config
            .flow
            .validate()
            .map_err(EngineError::ConfigInvalid)?;
        if config.routes.is_empty() {
            return Err(EngineError::ConfigInvalid(
                "routes table must register at least one (module, function)".into(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;
        Self::from_toml_str(&raw)
    }
}
