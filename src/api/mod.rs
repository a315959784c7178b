//! HTTP API for the prompt gateway.
//!
//! ## Endpoints
//!
//! - `POST /prompt` - Run the agents on `{"text": ...}` and return `{"text": ...}`
//! - `GET /prompt` - Fixed greeting
//! - `POST /chat` - Run the agents on a message with prior turns
//! - `GET /health` - Health check

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
