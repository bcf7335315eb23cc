// src/lib.rs

//! `interviewcore` is the orchestration engine behind an AI-driven technical
//! interview: from a rubric and a candidate profile it runs a stateful,
//! multi-stage conversation (warmup, per-competency probing, wrap-up),
//! scores answers against rubric criteria, and decides turn by turn when to
//! advance.
//!
//! The crate is organized the way an agentic toolkit typically is: small,
//! independent modules for the data model, the LLM gateway, the individual
//! agents, and the state machine that composes them.
//!
//! ```text
//! SessionManager
//!     └─ holds one InterviewContext per session, behind a per-session lock
//!          └─ FlowManager::turn()
//!               ├─ agents::evaluator   (score the latest answer)
//!               ├─ decide_transition    (stay / advance / wrap up)
//!               └─ agents::{warmup,questioner} (produce the next prompt)
//! ```
//!
//! All agent calls are routed through [`gateway::LlmGateway`], which is the
//! only component that ever reaches the network.

pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod ports;
pub mod profile;
pub mod routes;
pub mod rubric;
pub mod schema;
pub mod session;
pub mod transcript;

#[cfg(feature = "http-server")]
pub mod http;

pub use context::{Event, EventType, InterviewContext, Message, Speaker, Stage};
pub use error::EngineError;
pub use flow::FlowManager;
pub use session::SessionManager;
