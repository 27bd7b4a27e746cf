//! AI client interface for the upstream model provider.
//!
//! The [`AiClient`] trait is the seam between the prediction engine and the
//! hosted model. The engine depends only on being able to submit a prompt
//! and get a text completion back, with credential rejections and upstream
//! rate limits distinguishable from other transport failures through the
//! [`ServiceError`] kind.
//!
//! # Threading and safety
//!
//! All implementations of [`AiClient`] are required to be both [`Send`] and
//! [`Sync`], making them safe to share across request tasks.
//!
//! [`ServiceError`]: crate::error::ServiceError

mod anthropic;

pub use anthropic::AnthropicClient;

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;

use crate::config::Config;
use crate::error::Result;

/// HTTP header constants for consistent naming.
pub mod headers {
    /// Content-Type header
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// JSON content type value
    pub const APPLICATION_JSON: &str = "application/json";
    /// X-API-Key header
    pub const X_API_KEY: &str = "X-Api-Key";
    /// Anthropic version header
    pub const ANTHROPIC_VERSION: &str = "anthropic-version";
}

lazy_static! {
    /// Shared HTTP client reused across all AI client instances. Per-request
    /// timeouts are set explicitly, so the builder carries none.
    pub(crate) static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::Client::new();
}

/// Configuration options for one model request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Maximum number of tokens to generate in the response.
    pub max_tokens: u32,
    /// Controls randomness in the output, between 0.0 and 1.0.
    pub temperature: f32,
    /// Hard deadline for the request.
    pub timeout: Duration,
}

impl RequestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// A client for a hosted chat-completion model.
///
/// Implementations classify failures into [`ServiceError::Credentials`],
/// [`ServiceError::UpstreamRateLimit`], and the generic transport kinds, so
/// callers can map them to distinct HTTP statuses.
///
/// [`ServiceError::Credentials`]: crate::error::ServiceError::Credentials
/// [`ServiceError::UpstreamRateLimit`]: crate::error::ServiceError::UpstreamRateLimit
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiClient: Send + Sync {
    /// The model identifier this client addresses.
    fn model(&self) -> &str;

    /// Submit a prompt and return the raw text completion.
    async fn generate(&self, prompt: &str, options: &RequestOptions) -> Result<String>;
}

/// Build the client configured for this service.
pub fn build_client(config: &Config) -> Result<Box<dyn AiClient>> {
    let client = AnthropicClient::new(
        &config.api_key,
        &config.model,
        config.base_url.clone(),
        config.max_retries,
    )?;
    Ok(Box::new(client))
}
