use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use super::{headers, RequestOptions, SHARED_HTTP_CLIENT};
use crate::config::mask_api_key;
use crate::error::{Result, ServiceError};

/// The Anthropic API version header value.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
/// Default base URL for the Anthropic API.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
/// Expected prefix for Anthropic API keys.
pub const ANTHROPIC_API_KEY_PREFIX: &str = "sk-ant-";
/// Content type for text blocks.
const CONTENT_TYPE_TEXT: &str = "text";
/// Role for user messages.
const ROLE_USER: &str = "user";

/// Delay before the first retry; doubles per attempt.
const INITIAL_RETRY_DELAY_MS: u64 = 500;

/// Client for the Anthropic Messages API.
///
/// Timeout and retry budget are explicit construction-time settings rather
/// than library defaults, so both are visible in configuration and coverable
/// by tests.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: Option<String>,
        max_retries: u32,
    ) -> Result<Self> {
        if api_key.is_empty() {
            error!("Anthropic API key is not configured");
            return Err(ServiceError::Credentials(
                "Anthropic API key is not configured".to_string(),
            ));
        }

        if !api_key.starts_with(ANTHROPIC_API_KEY_PREFIX) {
            warn!(
                "API key {} does not start with expected prefix '{}'",
                mask_api_key(api_key),
                ANTHROPIC_API_KEY_PREFIX
            );
        }

        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string()),
            max_retries,
        })
    }

    fn create_request_body(&self, prompt: &str, options: &RequestOptions) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: vec![Message {
                role: ROLE_USER.to_string(),
                content: vec![Content {
                    content_type: CONTENT_TYPE_TEXT.to_string(),
                    text: prompt.to_string(),
                }],
            }],
        }
    }

    /// Classify a non-success status into the error kind the engine keys on.
    fn classify_status(status: reqwest::StatusCode, body: &str) -> ServiceError {
        match status.as_u16() {
            401 | 403 => ServiceError::Credentials(format!(
                "Anthropic API rejected the credentials: {status} - {body}"
            )),
            429 => ServiceError::UpstreamRateLimit(format!(
                "Anthropic API rate limit exceeded: {body}"
            )),
            // Server-side failures (500, 529 overloaded) are transient.
            s if s >= 500 => {
                ServiceError::Network(format!("Anthropic API server error: {status} - {body}"))
            }
            _ => ServiceError::Api(format!("Anthropic API error: {status} - {body}")),
        }
    }

    /// A server-side or transport hiccup worth spending a retry on.
    /// Credential and rate-limit rejections are never retried.
    fn is_retryable(err: &ServiceError) -> bool {
        matches!(err, ServiceError::Network(_))
    }

    async fn send_once(
        &self,
        request: &MessagesRequest,
        timeout: Duration,
    ) -> Result<MessagesResponse> {
        let url = format!("{}/messages", self.base_url);

        let response = SHARED_HTTP_CLIENT
            .post(&url)
            .header(headers::X_API_KEY, &self.api_key)
            .header(headers::ANTHROPIC_VERSION, ANTHROPIC_API_VERSION)
            .header(headers::CONTENT_TYPE, headers::APPLICATION_JSON)
            .timeout(timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!("Anthropic API error: {status} - {body}");
            return Err(Self::classify_status(status, &body));
        }

        let data: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(data)
    }
}

#[async_trait]
impl super::AiClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &RequestOptions) -> Result<String> {
        debug!("generating response with model {}", self.model);

        let request = self.create_request_body(prompt, options);
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        let mut attempt = 0;
        let response = loop {
            match self.send_once(&request, options.timeout).await {
                Ok(response) => break response,
                Err(err) if Self::is_retryable(&err) && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "transient Anthropic failure ({err}), retry {attempt}/{} in {}ms",
                        self.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        };

        let text = response
            .content
            .iter()
            .find(|c| c.content_type == CONTENT_TYPE_TEXT)
            .map(|c| c.text.clone())
            .ok_or_else(|| ServiceError::Api("no text content in Anthropic response".to_string()))?;

        Ok(text)
    }
}
