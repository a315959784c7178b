//! # Prompt Gateway
//!
//! HTTP service that answers prompts with a small tree of Gemini-backed agents.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────┐
//!                 │   root_agent   │
//!                 │ (Plan + ReAct) │
//!                 └───────┬────────┘
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!       ┌────────────┐        ┌────────────────┐
//!       │ time_agent │        │ location_agent │
//!       └────────────┘        └────────────────┘
//! ```
//!
//! ## Request Flow
//! 1. Receive a prompt via the HTTP API
//! 2. Create a fresh in-memory session
//! 3. Run the agent tree; the model delegates with `transfer_to_agent`
//! 4. Return the root agent's final answer
//!
//! ## Modules
//! - `agents`: agent descriptors, planner, and the served catalog
//! - `runner`: the invocation loop over sessions and the model
//! - `llm`: Gemini client and content types
//! - `session`: events and in-memory session storage
//! - `tools`: function tools exposed to the model

pub mod agents;
pub mod api;
pub mod config;
pub mod llm;
pub mod runner;
pub mod session;
pub mod tools;

pub use config::Config;
pub use runner::Runner;
