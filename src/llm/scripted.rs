//! Scripted LLM client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Content, LlmClient, LlmRequest, LlmResponse};

/// Replays queued responses in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<anyhow::Result<LlmResponse>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(contents: Vec<Content>) -> Self {
        let llm = Self::default();
        for content in contents {
            llm.push(content);
        }
        llm
    }

    pub fn push(&self, content: Content) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::from_content(content)));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
    }
}
