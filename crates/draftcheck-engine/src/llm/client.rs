use super::models::{Usage, DEFAULT_ENDPOINT, DEFAULT_MODEL, MAX_TOKENS};
use super::parse::{parse_suggestions, sanitize_api_response, truncate_str};
use super::prompts;
use crate::engine::{BackendFuture, SuggestionBackend};
use draftcheck_core::{AnalysisError, RateLimitOrigin, Suggestion};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retries after a 429 before the call is reported as rate limited
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Fixed pause between 429 retries
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2_000);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: MAX_TOKENS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Apply the optional model and endpoint from the user's config file.
    pub fn with_overrides(mut self, model: Option<&str>, endpoint: Option<&str>) -> Self {
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            self.model = model.to_string();
        }
        if let Some(endpoint) = endpoint.map(str::trim).filter(|e| !e.is_empty()) {
            self.endpoint = endpoint.to_string();
        }
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client for suggestion and rewrite requests.
///
/// Each call is one POST. A 429 is retried `max_retries` times after a fixed
/// delay; every other failure is returned straight away.
#[derive(Debug, Clone)]
pub struct RemoteSuggestionClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl RemoteSuggestionClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Ask the model for suggestions on `text`.
    pub async fn analyze(
        &self,
        text: &str,
        api_key: &str,
    ) -> Result<Vec<Suggestion>, AnalysisError> {
        let user = prompts::analyze_user(text);
        let content = self.complete(prompts::ANALYZE_SYSTEM, &user, api_key).await?;
        parse_suggestions(&content)
    }

    /// Ask the model to rewrite `text` in the given tone.
    pub async fn improve(
        &self,
        text: &str,
        tone: &str,
        api_key: &str,
    ) -> Result<String, AnalysisError> {
        let user = prompts::improve_user(text, tone);
        let content = self.complete(prompts::IMPROVE_SYSTEM, &user, api_key).await?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(AnalysisError::MalformedResponse(
                "empty rewrite".to_string(),
            ));
        }
        Ok(trimmed.to_string())
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        api_key: &str,
    ) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
        };

        let body = self.send_with_retry(api_key, &request).await?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(body = %sanitize_api_response(&body), "unparseable chat response");
            AnalysisError::MalformedResponse(format!("chat response: {}", e))
        })?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                model = %self.config.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "chat completion usage"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AnalysisError::MalformedResponse("response has no content".to_string()))
    }

    async fn send_with_retry(
        &self,
        api_key: &str,
        request: &ChatRequest<'_>,
    ) -> Result<String, AnalysisError> {
        let mut retry_count = 0;

        loop {
            let response = self
                .http
                .post(&self.config.endpoint)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", api_key))
                .json(request)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            let text = response.text().await.map_err(map_transport_error)?;

            if status.is_success() {
                return Ok(text);
            }

            if status.as_u16() == 429 {
                if retry_count < self.config.max_retries {
                    retry_count += 1;
                    tracing::warn!(
                        attempt = retry_count,
                        max_retries = self.config.max_retries,
                        delay_ms = self.config.retry_delay.as_millis() as u64,
                        "API rate limited; retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    continue;
                }
                tracing::warn!(retries = retry_count, "API still rate limited after retries");
                return Err(AnalysisError::RateLimited {
                    origin: RateLimitOrigin::Server,
                });
            }

            tracing::warn!(
                status = status.as_u16(),
                body = %sanitize_api_response(&text),
                "API request failed"
            );
            return Err(AnalysisError::Api {
                status: status.as_u16(),
            });
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> AnalysisError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not connect".to_string()
    } else {
        truncate_str(&err.to_string(), 200).to_string()
    };
    tracing::warn!(error = %err, "API transport failure");
    AnalysisError::Network(message)
}

impl SuggestionBackend for RemoteSuggestionClient {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
        api_key: &'a str,
    ) -> BackendFuture<'a, Vec<Suggestion>> {
        Box::pin(RemoteSuggestionClient::analyze(self, text, api_key))
    }

    fn improve<'a>(
        &'a self,
        text: &'a str,
        tone: &'a str,
        api_key: &'a str,
    ) -> BackendFuture<'a, String> {
        Box::pin(RemoteSuggestionClient::improve(self, text, tone, api_key))
    }
}
