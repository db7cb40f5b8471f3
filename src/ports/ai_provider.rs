//! AI Provider Port - Interface for text-generation backends.
//!
//! This port abstracts all interactions with the text-generation provider,
//! enabling the multi-step processor to ask questions without coupling to a
//! specific vendor API.
//!
//! # Design
//!
//! - `answer` is the fully drained `stream_answer`
//! - A stream is a lazy sequence of text fragments; setup failures are returned
//!   before the stream exists, mid-stream failures arrive as an `Err` item
//! - Dropping a stream releases the underlying connection
//!
//! # Empty responses
//!
//! `answer` never returns a placeholder text. When the drained stream holds no
//! text at all it fails with [`AIError::EmptyResponse`]. Whitespace is text and
//! is returned as is.
//!
//! # Example
//!
//! ```ignore
//! use async_trait::async_trait;
//!
//! struct EchoProvider;
//!
//! #[async_trait]
//! impl AIProvider for EchoProvider {
//!     async fn stream_answer(&self, request: AnswerRequest) -> Result<FragmentStream, AIError> {
//!         Ok(Box::pin(futures::stream::once(async move { Ok(request.prompt) })))
//!     }
//!
//!     fn provider_info(&self) -> ProviderInfo {
//!         ProviderInfo::new("echo", "echo-1")
//!     }
//! }
//! ```

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Lazily produced sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, AIError>> + Send>>;

/// Port for text-generation provider interactions.
///
/// Implementations connect to an external AI service and translate between
/// its API and these types.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Answers a prompt with the complete response text.
    ///
    /// The default implementation drains [`AIProvider::stream_answer`].
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AIError> {
        let fragments = self.stream_answer(request).await?;
        let text = collect_fragments(fragments).await?;
        Answer::from_text(text)
    }

    /// Answers a prompt as a stream of fragments in arrival order.
    async fn stream_answer(&self, request: AnswerRequest) -> Result<FragmentStream, AIError>;

    /// Get provider information (name, model).
    fn provider_info(&self) -> ProviderInfo;
}

/// A single prompt sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// Full prompt text.
    pub prompt: String,
    /// Subject domain; empty when the prompt already carries it.
    pub domain: String,
}

impl AnswerRequest {
    /// Creates a new request.
    pub fn new(prompt: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            domain: domain.into(),
        }
    }
}

/// Complete answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    /// Wraps response text, rejecting an empty string.
    pub fn from_text(text: impl Into<String>) -> Result<Self, AIError> {
        let text = text.into();
        if text.is_empty() {
            return Err(AIError::EmptyResponse);
        }
        Ok(Self { text })
    }
}

/// Provider information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g., "perplexity").
    pub name: String,
    /// Model identifier (e.g., "sonar-pro").
    pub model: String,
}

impl ProviderInfo {
    /// Creates new provider info.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Concatenates every fragment of a stream.
///
/// Stops at the first error and returns it; fragments read before the error
/// are discarded.
pub async fn collect_fragments(mut fragments: FragmentStream) -> Result<String, AIError> {
    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

/// AI provider errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AIError {
    /// Rate limited by provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until retry is allowed.
        retry_after_secs: u32,
    },

    /// Provider is unavailable.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Network error during request or while streaming.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out.
    #[error("request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u32,
    },

    /// The provider succeeded but produced no text.
    #[error("empty response")]
    EmptyResponse,
}

impl AIError {
    /// Creates a rate limited error.
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AIError::RateLimited { .. }
                | AIError::Unavailable { .. }
                | AIError::Network(_)
                | AIError::Timeout { .. }
                | AIError::EmptyResponse
        )
    }
}
