//! Gemini `generateContent` client with automatic retry for transient errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::error::{LlmError, RetryConfig};
use super::{Content, FunctionDeclaration, LlmClient, LlmRequest, LlmResponse, Part, TokenUsage};

/// Gemini API client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    retry_config: RetryConfig,
}

impl GeminiClient {
    /// Create a new client with default retry configuration.
    pub fn new(api_key: String, api_base: impl Into<String>) -> Self {
        Self::with_retry_config(api_key, api_base, RetryConfig::default())
    }

    /// Create a new client with custom retry configuration.
    pub fn with_retry_config(
        api_key: String,
        api_base: impl Into<String>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            retry_config,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }

    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Execute a single request without retry.
    async fn execute_request(
        &self,
        model: &str,
        body: &GeminiRequest,
    ) -> Result<LlmResponse, LlmError> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let (status_name, message) = match serde_json::from_str::<GeminiErrorBody>(&text) {
                Ok(parsed) => (parsed.error.status, parsed.error.message),
                Err(_) => (None, text),
            };
            return Err(LlmError::from_http(
                status.as_u16(),
                status_name.as_deref(),
                message,
                retry_after,
            ));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, text))
        })?;

        parsed.into_llm_response(model)
    }

    /// Execute a request with automatic retry for transient errors.
    async fn execute_with_retry(
        &self,
        model: &str,
        body: &GeminiRequest,
    ) -> anyhow::Result<LlmResponse> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let error = match self.execute_request(model, body).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Gemini request succeeded after {} retries ({:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(response);
                }
                Err(error) => error,
            };

            if !self.retry_config.should_retry(&error) || attempt >= self.retry_config.max_retries
            {
                tracing::error!("Gemini request failed after {} retries: {}", attempt, error);
                return Err(error.into());
            }

            let remaining = self
                .retry_config
                .max_retry_duration
                .saturating_sub(start.elapsed());
            let delay = error.suggested_delay(attempt).min(remaining);
            if delay.is_zero() {
                tracing::warn!("No retry time left after attempt {}: {}", attempt + 1, error);
                return Err(error.into());
            }

            tracing::warn!(
                "Attempt {} failed with {}, retrying in {:?}: {}",
                attempt + 1,
                error.kind,
                delay,
                error.message
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
        let body = GeminiRequest::from(request);
        tracing::debug!(
            model = %request.model,
            contents = request.contents.len(),
            tools = request.tools.len(),
            "Sending request to Gemini"
        );
        self.execute_with_retry(&request.model, &body).await
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

impl From<&LlmRequest> for GeminiRequest {
    fn from(request: &LlmRequest) -> Self {
        let options = &request.options;
        let generation_config = if options.temperature.is_some()
            || options.top_p.is_some()
            || options.max_output_tokens.is_some()
        {
            Some(GenerationConfig {
                temperature: options.temperature,
                top_p: options.top_p,
                max_output_tokens: options.max_output_tokens,
            })
        } else {
            None
        };

        Self {
            contents: request.contents.clone(),
            system_instruction: request
                .system_instruction
                .as_ref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| SystemInstruction {
                    parts: vec![Part::text(s.clone())],
                }),
            tools: if request.tools.is_empty() {
                Vec::new()
            } else {
                vec![GeminiTool {
                    function_declarations: request.tools.clone(),
                }]
            },
            generation_config,
        }
    }
}

/// `generateContent` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiResponse {
    fn into_llm_response(self, model: &str) -> Result<LlmResponse, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::blocked(format!("Prompt blocked: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::parse_error("No candidates in response".to_string()))?;

        let has_parts = candidate
            .content
            .as_ref()
            .map(|c| !c.parts.is_empty())
            .unwrap_or(false);
        if !has_parts {
            if let Some(reason) = candidate.finish_reason.as_deref() {
                if matches!(reason, "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") {
                    return Err(LlmError::blocked(format!("Response blocked: {}", reason)));
                }
            }
        }

        Ok(LlmResponse {
            content: candidate.content,
            finish_reason: candidate.finish_reason,
            usage: self
                .usage_metadata
                .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count)),
            model: self.model_version.or_else(|| Some(model.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationOptions, LlmErrorKind, Role};
    use axum::{extract::State, http::StatusCode, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request() -> LlmRequest {
        LlmRequest {
            model: "gemini-2.0-flash".to_string(),
            system_instruction: Some("Be brief.".to_string()),
            contents: vec![Content::user_text("What time is it?")],
            tools: vec![FunctionDeclaration {
                name: "get_current_time_tool".to_string(),
                description: "Returns the current local time.".to_string(),
                parameters: None,
            }],
            options: GenerationOptions::default(),
        }
    }

    #[test]
    fn request_body_uses_gemini_field_names() {
        let body = serde_json::to_value(GeminiRequest::from(&request())).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "get_current_time_tool"
        );
        assert!(body["tools"][0]["functionDeclarations"][0]
            .get("parameters")
            .is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn sampling_options_become_generation_config() {
        let mut request = request();
        request.options = GenerationOptions {
            temperature: Some(0.3),
            top_p: None,
            max_output_tokens: Some(128),
        };
        let body = serde_json::to_value(GeminiRequest::from(&request)).unwrap();
        assert_eq!(body["generationConfig"]["temperature"], 0.3);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
        assert!(body["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn endpoint_strips_models_prefix() {
        let client = GeminiClient::new("key".to_string(), "https://example.test/");
        assert_eq!(
            client.endpoint("models/gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn response_with_function_call_is_parsed() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "transfer_to_agent", "args": {"agent_name": "time_agent"}}}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15},
            "modelVersion": "gemini-2.0-flash-001"
        });
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let response = parsed.into_llm_response("gemini-2.0-flash").unwrap();
        let content = response.content.unwrap();
        assert_eq!(content.role, Role::Model);
        assert_eq!(content.function_calls()[0].name, "transfer_to_agent");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(response.model.as_deref(), Some("gemini-2.0-flash-001"));
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let raw = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let err = parsed.into_llm_response("gemini-2.0-flash").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Blocked);
    }

    #[test]
    fn empty_candidate_list_is_a_parse_error() {
        let parsed: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        let err = parsed.into_llm_response("gemini-2.0-flash").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ParseError);
    }

    /// Local stand-in for the Gemini API answering with a fixed sequence of
    /// statuses (the last one repeats).
    struct FakeGemini {
        hits: AtomicUsize,
        statuses: Vec<(u16, &'static str)>,
    }

    async fn fake_generate(State(fake): State<Arc<FakeGemini>>) -> (StatusCode, Json<Value>) {
        let n = fake.hits.fetch_add(1, Ordering::SeqCst);
        let (code, status) = fake.statuses[n.min(fake.statuses.len() - 1)];
        let code = StatusCode::from_u16(code).unwrap();
        if code.is_success() {
            let body = json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "ok"}]},
                    "finishReason": "STOP"
                }]
            });
            return (code, Json(body));
        }
        let body = json!({
            "error": {"code": code.as_u16(), "message": "fake failure", "status": status}
        });
        (code, Json(body))
    }

    async fn spawn_fake(statuses: Vec<(u16, &'static str)>) -> (String, Arc<FakeGemini>) {
        let fake = Arc::new(FakeGemini {
            hits: AtomicUsize::new(0),
            statuses,
        });
        let app = Router::new()
            .fallback(fake_generate)
            .with_state(Arc::clone(&fake));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), fake)
    }

    #[tokio::test]
    async fn unavailable_is_retried_until_success() {
        let (base, fake) = spawn_fake(vec![(503, "UNAVAILABLE"), (200, "")]).await;
        let client = GeminiClient::new("key".to_string(), base);

        let response = client.generate(&request()).await.unwrap();
        let text = response.content.unwrap().parts[0].text.clone();
        assert_eq!(text.as_deref(), Some("ok"));
        assert_eq!(fake.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_argument_is_not_retried() {
        let (base, fake) = spawn_fake(vec![(400, "INVALID_ARGUMENT"), (200, "")]).await;
        let client = GeminiClient::new("key".to_string(), base);

        let err = client.generate(&request()).await.unwrap_err();
        let err = err.downcast_ref::<LlmError>().unwrap();
        assert_eq!(err.kind, LlmErrorKind::ClientError);
        assert_eq!(err.status_code, Some(400));
        assert_eq!(fake.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_budget_bounds_the_loop() {
        let (base, fake) = spawn_fake(vec![(503, "UNAVAILABLE")]).await;
        let retry = RetryConfig {
            max_retries: 10,
            max_retry_duration: Duration::from_millis(300),
            ..RetryConfig::default()
        };
        let client = GeminiClient::with_retry_config("key".to_string(), base, retry);

        let started = Instant::now();
        let err = client.generate(&request()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<LlmError>().unwrap().kind,
            LlmErrorKind::ServerError
        );
        // One retry fits in the budget; the next backoff does not.
        assert_eq!(fake.hits.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn truncated_body_is_a_network_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64 * 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 500\r\n\r\n{\"candidates\"")
                .await;
        });

        let client = GeminiClient::with_retry_config(
            "key".to_string(),
            format!("http://{}", addr),
            RetryConfig::disabled(),
        );
        let err = client.generate(&request()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<LlmError>().unwrap().kind,
            LlmErrorKind::NetworkError
        );
    }
}
