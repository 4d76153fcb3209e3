//! OpenAI-compatible chat-completions client.
//!
//! Works against any server exposing `POST {base_url}/chat/completions`
//! (OpenAI, Mistral, vLLM, llama.cpp server, Ollama's `/v1`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::ModelError;
use parley_core::model::ModelGateway;
use parley_types::models::PromptMessage;

/// Longest error body kept from a failed model response.
const MAX_ERROR_BODY: usize = 512;

/// Does NOT derive Debug: the API key must stay out of logs.
pub struct OpenAiGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiGateway {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn extract_reply(response: CompletionResponse) -> Result<String, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Malformed("response has no choices".into()))?;
    choice
        .message
        .content
        .ok_or_else(|| ModelError::Malformed("first choice has no content".into()))
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn invoke(&self, model_id: &str, messages: &[PromptMessage]) -> Result<String, ModelError> {
        let mut request = self.client.post(&self.endpoint).json(&CompletionRequest {
            model: model_id,
            messages,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = model_id, messages = messages.len(), "calling model");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout
            } else {
                ModelError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        extract_reply(body)
    }
}
