// api interaction module - handles openrouter api communication

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::prompts::{construct_payload_prompt, construct_prompt, get_system_prompt};
use super::validation::extract_commit_message;
use crate::config::AiConfig;
use crate::svn::DiffPayload;

/// turns assembled diff text into a commit message
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, diff_content: &str, language: &str) -> Result<String>;

    /// richer entry point that can also see the file lists
    async fn summarize_payload(&self, payload: &DiffPayload, language: &str) -> Result<String> {
        self.summarize(&payload.diff_content, language).await
    }
}

// openrouter api structures
#[derive(Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenRouterResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// `Summarizer` backed by the openrouter chat completions api
pub struct OpenRouterSummarizer {
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: u32,
}

impl OpenRouterSummarizer {
    pub fn new(api_key: impl Into<String>, config: &AiConfig) -> Self {
        Self {
            api_key: api_key.into(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            max_retries: 3,
        }
    }

    /// read `OPENROUTER_API_KEY` from the environment
    pub fn from_env(config: &AiConfig) -> Result<Self> {
        let api_key = env::var("OPENROUTER_API_KEY")
            .context("OPENROUTER_API_KEY environment variable is not set")?;
        Ok(Self::new(api_key, config))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: String, language: &str) -> Result<String> {
        let request = OpenRouterRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: get_system_prompt(language),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            temperature: Some(0.2),
            top_p: Some(0.9),
            max_tokens: Some(400),
        };

        let response = self.make_api_request(&request).await?;
        let raw_response = match response.choices.first() {
            Some(choice) => choice.message.content.clone(),
            None => {
                warn!("empty choices in openrouter response");
                String::new()
            }
        };
        debug!(raw = %raw_response, "raw api response");

        let message = extract_commit_message(&raw_response);
        if message.is_empty() {
            return Err(anyhow::anyhow!("model returned an empty commit message"));
        }
        Ok(message)
    }

    /// make api request to openrouter
    async fn make_api_request(&self, request: &OpenRouterRequest) -> Result<OpenRouterResponse> {
        let mut retry_delay = Duration::from_secs(1);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        for attempt in 0..self.max_retries {
            let response = client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    if resp.status().is_success() {
                        let body = resp
                            .json::<OpenRouterResponse>()
                            .await
                            .context("failed to parse openrouter api response")?;
                        return Ok(body);
                    }

                    let status = resp.status();
                    let error_text = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());

                    if (status.is_server_error() || status == 429) && attempt < self.max_retries - 1 {
                        warn!(%status, error = %error_text, ?retry_delay, "retryable api error");
                        sleep(retry_delay).await;
                        retry_delay *= 2;
                        continue;
                    }
                    if status == 400 && error_text.to_lowercase().contains("model") {
                        return Err(anyhow::anyhow!(
                            "invalid model '{}'. set OPENROUTER_MODEL or ai.model in the config file",
                            request.model
                        ));
                    }
                    return Err(anyhow::anyhow!(
                        "openrouter api error ({}): {}",
                        status,
                        error_text
                    ));
                }
                Err(e) => {
                    if attempt < self.max_retries - 1 {
                        warn!(error = %e, ?retry_delay, "network error, retrying");
                        sleep(retry_delay).await;
                        retry_delay *= 2;
                        continue;
                    }
                    return Err(anyhow::anyhow!(
                        "failed to connect to openrouter api after {} attempts: {e}",
                        self.max_retries
                    ));
                }
            }
        }

        Err(anyhow::anyhow!(
            "failed to complete api request after {} attempts",
            self.max_retries
        ))
    }
}

#[async_trait]
impl Summarizer for OpenRouterSummarizer {
    async fn summarize(&self, diff_content: &str, language: &str) -> Result<String> {
        self.complete(construct_prompt(diff_content, language), language)
            .await
    }

    async fn summarize_payload(&self, payload: &DiffPayload, language: &str) -> Result<String> {
        self.complete(construct_payload_prompt(payload, language), language)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Summarizer for Echo {
        async fn summarize(&self, diff_content: &str, language: &str) -> Result<String> {
            Ok(format!("{language}: {diff_content}"))
        }
    }

    #[tokio::test]
    async fn payload_defaults_to_diff_content() {
        let payload = DiffPayload::empty();
        let out = Echo.summarize_payload(&payload, "English").await.unwrap();
        assert_eq!(out, "English: No modifications found.");
    }

    #[test]
    fn summarizer_uses_configured_model() {
        let config = AiConfig::default();
        let summarizer = OpenRouterSummarizer::new("key", &config);
        assert_eq!(summarizer.model(), config.model);
    }

    #[test]
    fn request_skips_unset_options() {
        let request = OpenRouterRequest {
            model: "m".to_string(),
            messages: vec![],
            temperature: None,
            top_p: Some(0.5),
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["top_p"], 0.5);
    }
}
