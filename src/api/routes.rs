//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use futures::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agents::{catalog, AgentError, AgentTree};
use crate::config::Config;
use crate::llm::{Content, GeminiClient, LlmClient, RetryConfig};
use crate::runner::Runner;
use crate::session::{new_invocation_id, Event, InMemorySessionService, SessionService, USER_AUTHOR};

use super::types::*;

const GREETING: &str = "This is your prompt!";

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Model backend shared by every request
    pub llm: Arc<dyn LlmClient>,
    /// The agents served by this gateway
    pub tree: Arc<AgentTree>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let retry_config = RetryConfig {
        max_retries: config.llm_max_retries,
        ..RetryConfig::default()
    };
    let llm: Arc<dyn LlmClient> = Arc::new(GeminiClient::with_retry_config(
        config.api_key.clone(),
        config.api_base.clone(),
        retry_config,
    ));
    let tree = Arc::new(catalog::build_tree(&config)?);
    tracing::info!(
        agents = ?tree.names(),
        model = %config.default_model,
        "Agent tree ready"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        llm,
        tree,
    });

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prompt", get(get_prompt).post(post_prompt))
        .route("/chat", post(post_chat))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.default_model.clone(),
        agent: state.config.profile.as_str().to_string(),
    })
}

async fn get_prompt() -> Json<GreetingResponse> {
    Json(GreetingResponse {
        prompt: GREETING.to_string(),
    })
}

/// Run the agents on a single prompt.
async fn post_prompt(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptResponse>, (StatusCode, String)> {
    let text = run_agents(&state, Vec::new(), req.text).await?;
    Ok(Json(PromptResponse { text }))
}

/// Run the agents on a message, replaying earlier turns into the session first.
async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let invocation_id = new_invocation_id();
    let root = state.tree.root();
    let history = req
        .history
        .into_iter()
        .map(|turn| match turn.role {
            ChatRole::User => Event::new(
                &invocation_id,
                USER_AUTHOR,
                Some(Content::user_text(turn.content)),
            ),
            ChatRole::Assistant => Event::new(
                &invocation_id,
                root.name(),
                Some(Content::model_text(turn.content)),
            ),
        })
        .collect();

    let response = run_agents(&state, history, req.message).await?;
    Ok(Json(ChatResponse { response }))
}

/// Create a fresh session, run the tree on `message` and return the reply.
async fn run_agents(
    state: &AppState,
    history: Vec<Event>,
    message: String,
) -> Result<String, (StatusCode, String)> {
    let settings = &state.config.session;
    let key = settings.key();

    let sessions = Arc::new(InMemorySessionService::new());
    sessions
        .create_session(&key, None)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    for event in history {
        sessions
            .append_event(&key, event)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }

    let runner = Runner::new(
        settings.app_name.clone(),
        Arc::clone(&state.tree),
        sessions.clone(),
        Arc::clone(&state.llm),
    )
    .with_max_iterations(state.config.max_iterations);

    tracing::debug!(app = runner.app_name(), session = %key, "Running agents");
    let mut events = runner.run(
        &settings.user_id,
        &settings.session_id,
        Content::user_text(message),
    );
    let mut final_event = None;
    while let Some(result) = events.next().await {
        let event = result.map_err(error_response)?;
        tracing::debug!(
            author = %event.author,
            event = %serde_json::to_string(&event).unwrap_or_default(),
            "Event"
        );
        if event.is_final_response() {
            final_event = Some(event);
        }
    }

    if let Ok(Some(session)) = sessions.get_session(&key).await {
        tracing::debug!(
            session = %key,
            state = %serde_json::Value::Object(session.state),
            "Session state after run"
        );
    }

    final_event
        .and_then(|event| event.final_text())
        .ok_or_else(|| {
            tracing::warn!("Agents produced no final response");
            (
                StatusCode::BAD_GATEWAY,
                "Agents produced no final response".to_string(),
            )
        })
}

fn error_response(error: AgentError) -> (StatusCode, String) {
    let status = match &error {
        AgentError::Session(_) | AgentError::Tree(_) | AgentError::InvalidName(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        AgentError::LlmError(_) | AgentError::MaxIterations(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    tracing::error!("Agent run failed: {}", error);
    (status, error.to_string())
}
