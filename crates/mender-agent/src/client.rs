//! Anthropic-backed fix generator

use crate::auth;
use crate::circuit_breaker::CircuitBreaker;
use crate::prompt::{build_fix_prompt, extract_code, SYSTEM_PROMPT};
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse, Model};
use async_trait::async_trait;
use mender_core::config::ModelConfig;
use mender_core::{FixGenerator, Language, MenderError, Result};
use std::sync::OnceLock;
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 16000;

// Retry configuration for 429 and 5xx responses. A fix loop is waiting on
// every call, so this is tighter than a batch client would use.
const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

// Shared across every run in the process
static CIRCUIT_BREAKER: OnceLock<CircuitBreaker> = OnceLock::new();

fn circuit_breaker() -> &'static CircuitBreaker {
    CIRCUIT_BREAKER.get_or_init(CircuitBreaker::default)
}

/// Generates fixes with a single stateless Messages API call per fix
#[derive(Debug, Clone)]
pub struct LlmFixGenerator {
    model: Model,
    max_tokens: usize,
    api_key_env: String,
    endpoint: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl LlmFixGenerator {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            endpoint: ANTHROPIC_API_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let model = config
            .model
            .parse::<Model>()
            .map_err(MenderError::Config)?;

        Ok(Self::new(model)
            .with_max_tokens(config.max_tokens)
            .with_api_key_env(&config.api_key_env))
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Read the API key from a different environment variable
    pub fn with_api_key_env(mut self, env_var: &str) -> Self {
        self.api_key_env = env_var.to_string();
        self
    }

    /// Send requests somewhere other than the public API
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// Ask the model for corrected content. Any failure is an error here;
    /// the `FixGenerator` impl turns it into a no-op fix.
    pub async fn request_fix(
        &self,
        file_content: &str,
        error_log: &str,
        language: Language,
    ) -> Result<String> {
        let breaker = circuit_breaker();
        if !breaker.can_execute() {
            return Err(MenderError::ApiLimit(format!(
                "Circuit breaker is OPEN - too many API failures. Wait {} seconds before retry.",
                breaker.time_until_retry() / 1000
            )));
        }

        let api_key = auth::api_key(&self.api_key_env)?;

        let request = AnthropicRequest {
            model: self.model.api_name().to_string(),
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: build_fix_prompt(file_content, error_log, language),
            }],
        };

        let mut retries = 0;
        let mut backoff_secs = INITIAL_BACKOFF_SECS;

        loop {
            tracing::debug!(
                "Requesting {} fix from {} (attempt {})",
                language,
                self.model,
                retries + 1
            );

            let response = match self
                .http
                .post(&self.endpoint)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    breaker.record_failure();
                    return Err(MenderError::Api(format!("Failed to send request: {}", e)));
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > self.max_retries {
                    breaker.record_failure();
                    return Err(MenderError::ApiLimit(format!(
                        "Rate limit exceeded after {} retries",
                        self.max_retries
                    )));
                }

                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs)
                    .min(MAX_BACKOFF_SECS);

                tracing::warn!(
                    "Rate limited (429). Waiting {} seconds before retry {}/{}",
                    wait_secs,
                    retries,
                    self.max_retries
                );
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());

                if status.is_server_error() && retries < self.max_retries {
                    retries += 1;
                    tracing::warn!(
                        "Server error ({}). Waiting {} seconds before retry {}/{}",
                        status,
                        backoff_secs,
                        retries,
                        self.max_retries
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }

                breaker.record_failure();
                tracing::error!(
                    "Circuit breaker: recorded failure (count: {})",
                    breaker.failure_count()
                );
                return Err(MenderError::Api(format!(
                    "Anthropic API error {}: {}",
                    status, error_text
                )));
            }

            let body: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| MenderError::Api(format!("Failed to parse response: {}", e)))?;

            breaker.record_success();

            if let Some(usage) = &body.usage {
                tracing::info!(
                    "Fix generated ({} input tokens, {} output tokens)",
                    usage.input_tokens,
                    usage.output_tokens
                );
            }

            return extract_code(&body.text())
                .ok_or_else(|| MenderError::Api("Response contained no code".to_string()));
        }
    }
}

impl Default for LlmFixGenerator {
    fn default() -> Self {
        Self::new(Model::default())
    }
}

#[async_trait]
impl FixGenerator for LlmFixGenerator {
    async fn generate_fix(
        &self,
        file_content: &str,
        error_log: &str,
        language: Language,
    ) -> Result<String> {
        match self.request_fix(file_content, error_log, language).await {
            Ok(fixed) => Ok(fixed),
            Err(e) => {
                tracing::warn!("Fix generation unavailable, keeping original content: {}", e);
                Ok(file_content.to_string())
            }
        }
    }
}
