use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use relay_core::config::{LlmConfig, LlmProvider};

use crate::conversation::ChatMessage;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One completion turn: system prompt plus the running transcript in,
    /// the model's free-form reply text out.
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String>;
}

/// Builds the transport matching the configured provider. OpenAI and Ollama
/// share the chat-completions wire format; Anthropic has its own.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()
        .context("building LLM HTTP client")?;

    let api_key =
        config.api_key.as_ref().map(|key| key.expose_secret().to_string()); // ubs:ignore

    match config.provider {
        LlmProvider::Anthropic => {
            let api_key = api_key.context("anthropic provider requires an API key")?;
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string());
            Ok(Arc::new(AnthropicClient {
                client,
                base_url,
                api_key,
                model: config.model.clone(),
                max_retries: config.max_retries,
            }))
        }
        LlmProvider::OpenAi => {
            let api_key = api_key.context("openai provider requires an API key")?;
            let base_url =
                config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string());
            Ok(Arc::new(OpenAiCompatibleClient {
                client,
                base_url,
                api_key: Some(api_key),
                model: config.model.clone(),
                max_retries: config.max_retries,
            }))
        }
        LlmProvider::Ollama => {
            let base_url =
                config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string());
            Ok(Arc::new(OpenAiCompatibleClient {
                client,
                base_url,
                api_key,
                model: config.model.clone(),
                max_retries: config.max_retries,
            }))
        }
    }
}

pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let messages: Vec<_> = history
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();
        let body = json!({
            "model": self.model,
            "max_tokens": 2048,
            "system": system_prompt,
            "messages": messages,
        });

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }

            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await;

            match check_response(response).await {
                Ok(text) => {
                    let parsed: AnthropicResponse =
                        serde_json::from_str(&text).context("decoding completion response")?;
                    let reply =
                        parsed.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("");
                    return Ok(reply);
                }
                Err(RequestFailure::Retryable(error)) => last_error = Some(error),
                Err(RequestFailure::Fatal(error)) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("completion request failed")))
    }
}

/// Chat-completions transport, used for OpenAI and for Ollama's
/// OpenAI-compatible endpoint (where no API key is required).
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let mut messages = vec![json!({"role": "system", "content": system_prompt})];
        messages.extend(
            history.iter().map(|m| json!({"role": m.role.as_str(), "content": m.content})),
        );
        let body = json!({"model": self.model, "messages": messages});

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }

            let mut request = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match check_response(request.send().await).await {
                Ok(text) => {
                    let parsed: ChatCompletionResponse =
                        serde_json::from_str(&text).context("decoding completion response")?;
                    let Some(choice) = parsed.choices.into_iter().next() else {
                        bail!("completion response contained no choices");
                    };
                    return Ok(choice.message.content);
                }
                Err(RequestFailure::Retryable(error)) => last_error = Some(error),
                Err(RequestFailure::Fatal(error)) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("completion request failed")))
    }
}

enum RequestFailure {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

/// Server errors and transport failures retry; client errors do not.
async fn check_response(
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<String, RequestFailure> {
    let response = match response {
        Ok(response) => response,
        Err(error) => return Err(RequestFailure::Retryable(error.into())),
    };

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|error| RequestFailure::Retryable(error.into()))?;

    if status.is_success() {
        Ok(body)
    } else if status.is_server_error() || status.as_u16() == 429 {
        Err(RequestFailure::Retryable(anyhow::anyhow!("provider returned {status}: {body}")))
    } else {
        Err(RequestFailure::Fatal(anyhow::anyhow!("provider returned {status}: {body}")))
    }
}
