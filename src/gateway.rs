//! The LLM Gateway: the single ingress every agent call goes through
//! (§4.1).
//!
//! Shaped after `ClientWrapper`, the provider-agnostic async trait a
//! typical agent toolkit puts in front of vendor SDKs: one async method,
//! `Send + Sync`, no conversation bookkeeping of its own. Here the trait is
//! narrowed to the one-shot, schema-free wire contract named in §6.2
//! (`LlmTransport::chat`) — enforcing the JSON schema, retrying, and
//! sending repair prompts are the Gateway's job, not the transport's.

use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::time::Duration;

use crate::error::EngineError;

lazy_static! {
    /// Shared, connection-pooled HTTP client. A single instance keeps TLS
    /// sessions and DNS lookups warm across every route and every session,
    /// the same pooling rationale a shared `reqwest::Client` singleton
    /// serves in a typical provider-client module.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()
        .expect("failed to build shared HTTP client");
}

/// `json_object` asks the provider for a structured-output mode when it
/// supports one; `text` falls back to plain completions with the schema
/// only described in the system hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
    Text,
}

/// Per-(module, function) routing: which model, which endpoint, how many
/// retries, and what sampling parameters to use for a given agent call
/// (§4.1, §6.3).
#[derive(Debug, Clone)]
pub struct LlmRoute {
    pub base_url: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub response_format: ResponseFormat,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

/// A chat message in the provider-agnostic wire shape the transport sends.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The only network egress in the engine (§6.2). Implementations translate
/// `messages` into a provider request and return the raw assistant text;
/// the Gateway is solely responsible for parsing and validating that text
/// against a schema.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn chat(
        &self,
        base_url: &str,
        model: &str,
        endpoint: &str,
        messages: &[ChatMessage],
        format: ResponseFormat,
        timeout_ms: u64,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Default [`LlmTransport`] for any OpenAI-chat-compatible HTTP endpoint,
/// built on the same pooled `reqwest::Client` pattern a typical provider
/// client module shares across wrappers.
pub struct ReqwestLlmTransport {
    api_key: String,
}

impl ReqwestLlmTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into() }
    }

    /// Resolves the API key from the environment variable named in the
    /// config document, read lazily so the key never lives on
    /// `EngineConfig` itself (§6.3 supplement).
    pub fn from_env_var(var_name: &str) -> Result<Self, EngineError> {
        let key = std::env::var(var_name)
            .map_err(|_| EngineError::ConfigInvalid(format!("missing env var {}", var_name)))?;
        Ok(Self::new(key))
    }
}

#[async_trait]
impl LlmTransport for ReqwestLlmTransport {
    async fn chat(
        &self,
        base_url: &str,
        model: &str,
        endpoint: &str,
        messages: &[ChatMessage],
        format: ResponseFormat,
        timeout_ms: u64,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
        });
        if format == ResponseFormat::JsonObject {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let url = format!("{}{}", base_url, endpoint);
        let response = SHARED_HTTP_CLIENT
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            return Err(format!("transport returned {}: {}", status, payload).into());
        }

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "transport response missing choices[0].message.content".into())
    }
}

/// Enforces an `OutputSchema` against every call routed through it:
/// prepends the schema hint, requests structured output when the route
/// supports it, retries with a repair prompt on parse/validation failure,
/// and caps attempts at `route.max_retries`. Timeouts count as
/// retry-eligible failures, matching §4.1.
pub struct LlmGateway<T: LlmTransport> {
    transport: T,
}

impl<T: LlmTransport> LlmGateway<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Calls `route` with `task` as the user content, forcing the response
    /// to match `S`'s JSON schema. Logs only the route name, attempt
    /// count, and failure kind on each retry — never the message bodies
    /// (§4.1's PII/secret hygiene rule).
    pub async fn call<S: DeserializeOwned + crate::schema::OutputSchema>(
        &self,
        route_name: &str,
        task: &str,
        route: &LlmRoute,
    ) -> Result<S, EngineError> {
        let schema = S::json_schema();
        let system_hint = format!(
            "Reply with a single JSON object matching this schema.\n{}",
            schema
        );

        let mut messages = vec![
            ChatMessage { role: "system", content: system_hint.clone() },
            ChatMessage { role: "user", content: task.to_string() },
        ];

        let attempts = route.max_retries.max(1);
        let mut last_failure_kind = "none";

        for attempt in 1..=attempts {
            let call = self.transport.chat(
                &route.base_url,
                &route.model,
                &route.endpoint,
                &messages,
                route.response_format,
                route.timeout_ms,
            );

            let raw = match tokio::time::timeout(
                Duration::from_millis(route.timeout_ms),
                call,
            )
            .await
            {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    last_failure_kind = "transport";
                    log::warn!(
                        "route={} attempt={} failure_kind={} llm transport call failed",
                        route_name,
                        attempt,
                        last_failure_kind
                    );
                    let _ = e;
                    continue;
                }
                Err(_) => {
                    last_failure_kind = "timeout";
                    log::warn!(
                        "route={} attempt={} failure_kind={} llm call timed out",
                        route_name,
                        attempt,
                        last_failure_kind
                    );
                    continue;
                }
            };

            match serde_json::from_str::<S>(&raw) {
                Ok(parsed) => return Ok(parsed),
                Err(parse_err) => {
                    last_failure_kind = "invalid_json";
                    log::warn!(
                        "route={} attempt={} failure_kind={} llm output failed schema validation",
                        route_name,
                        attempt,
                        last_failure_kind
                    );
                    messages.push(ChatMessage { role: "assistant", content: raw });
                    messages.push(ChatMessage {
                        role: "user",
                        content: format!(
                            "That reply did not match the required schema ({}). \
                             Reply again with a single JSON object matching:\n{}",
                            parse_err, schema
                        ),
                    });
                }
            }
        }

        log::error!(
            "route={} exhausted {} attempts, last_failure_kind={}",
            route_name,
            attempts,
            last_failure_kind
        );
        Err(EngineError::LLMFailure(format!(
            "route {} exhausted retries ({})",
            route_name, last_failure_kind
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AutoReplyOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedTransport {
        replies: Vec<String>,
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmTransport for ScriptedTransport {
        async fn chat(
            &self,
            _base_url: &str,
            _model: &str,
            _endpoint: &str,
            _messages: &[ChatMessage],
            _format: ResponseFormat,
            _timeout_ms: u64,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.replies[idx.min(self.replies.len() - 1)].clone())
        }
    }

    fn route() -> LlmRoute {
        LlmRoute {
            base_url: "https://example.invalid".into(),
            model: "test-model".into(),
            endpoint: "/v1/chat/completions".into(),
            timeout_ms: 5_000,
            max_retries: 3,
            response_format: ResponseFormat::JsonObject,
            temperature: None,
            top_p: None,
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_valid_json() {
        let transport = ScriptedTransport {
            replies: vec![r#"{"content":"hello"}"#.to_string()],
            call_count: Arc::new(AtomicUsize::new(0)),
        };
        let gateway = LlmGateway::new(transport);
        let out: AutoReplyOutput = gateway.call("agents::auto_reply", "say hi", &route()).await.unwrap();
        assert_eq!(out.content, "hello");
    }

    #[tokio::test]
    async fn retries_after_malformed_json_then_succeeds() {
        let transport = ScriptedTransport {
            replies: vec![
                "not json at all".to_string(),
                r#"{"content":"recovered"}"#.to_string(),
            ],
            call_count: Arc::new(AtomicUsize::new(0)),
        };
        let gateway = LlmGateway::new(transport);
        let out: AutoReplyOutput = gateway.call("agents::auto_reply", "say hi", &route()).await.unwrap();
        assert_eq!(out.content, "recovered");
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_llm_failure() {
        let transport = ScriptedTransport {
            replies: vec!["still not json".to_string()],
            call_count: Arc::new(AtomicUsize::new(0)),
        };
        let gateway = LlmGateway::new(transport);
        let result: Result<AutoReplyOutput, EngineError> =
            gateway.call("agents::auto_reply", "say hi", &route()).await;
        assert!(matches!(result, Err(EngineError::LLMFailure(_))));
    }
}
