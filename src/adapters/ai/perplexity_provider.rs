//! Perplexity Provider - Implementation of AIProvider for Perplexity's API.
//!
//! Talks to the OpenAI-compatible chat completions endpoint, with answers
//! delivered as Server-Sent Events (SSE). A complete answer is the drained
//! stream, so empty output fails the same way for every caller.
//!
//! # Configuration
//!
//! ```ignore
//! let config = PerplexityConfig::new(api_key)
//!     .with_model("sonar-pro")
//!     .with_timeout(Duration::from_secs(60));
//!
//! let provider = PerplexityProvider::new(config)?;
//! ```
//!
//! # Streaming
//!
//! Each `data:` line carries one JSON chunk whose delta content becomes a
//! fragment. Lines may be split across network chunks, so bytes are buffered
//! until a full line is available. The stream ends at `data: [DONE]` or when
//! the body closes. Dropping the stream drops the response body and with it
//! the connection.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use crate::ports::{AIError, AIProvider, AnswerRequest, FragmentStream, ProviderInfo};

/// Default system prompt for company questions.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes companies based on questions. \
When asked about a company, provide accurate information based on current data. \
Always be professional and factual, and answer in plain, unformatted text.";

/// Configuration for the Perplexity provider.
#[derive(Debug, Clone)]
pub struct PerplexityConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model to use (e.g., "sonar-pro", "sonar").
    pub model: String,
    /// Base URL for the API (default: https://api.perplexity.ai).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// System prompt sent ahead of every question.
    pub system_prompt: Option<String>,
}

impl PerplexityConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "sonar-pro".to_string(),
            base_url: "https://api.perplexity.ai".to_string(),
            timeout: Duration::from_secs(60),
            max_tokens: Some(2000),
            temperature: Some(0.7),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets or clears the system prompt.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn timeout_secs(&self) -> u32 {
        self.timeout.as_secs() as u32
    }
}

/// Perplexity API provider implementation.
pub struct PerplexityProvider {
    config: PerplexityConfig,
    client: Client,
}

impl PerplexityProvider {
    /// Creates a new Perplexity provider with the given configuration.
    pub fn new(config: PerplexityConfig) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Builds the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Converts our request to a streaming chat completions request.
    fn to_chat_request(&self, request: &AnswerRequest) -> ChatRequest {
        let mut messages = Vec::new();

        if let Some(ref prompt) = self.config.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: prompt.clone(),
            });
        }

        let content = if request.domain.is_empty() {
            request.prompt.clone()
        } else {
            format!("{}\n\nCompany domain: {}", request.prompt, request.domain)
        };
        messages.push(ChatMessage {
            role: "user",
            content,
        });

        ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
        }
    }

    /// Sends a request and rejects non-success statuses.
    async fn send(&self, body: &ChatRequest) -> Result<Response, AIError> {
        tracing::debug!(
            model = %body.model,
            prompt_bytes = body.messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&e, self.config.timeout_secs()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());
        let error_body = response.text().await.unwrap_or_default();

        tracing::warn!(status = status.as_u16(), "Chat completion request rejected");
        Err(status_error(status.as_u16(), &error_body, retry_after))
    }
}

#[async_trait]
impl AIProvider for PerplexityProvider {
    async fn stream_answer(&self, request: AnswerRequest) -> Result<FragmentStream, AIError> {
        let response = self.send(&self.to_chat_request(&request)).await?;

        let timeout_secs = self.config.timeout_secs();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| transport_error(&e, timeout_secs)));

        Ok(sse_fragments(body))
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("perplexity", &self.config.model)
    }
}

/// Maps a reqwest failure to a provider error.
fn transport_error(e: &reqwest::Error, timeout_secs: u32) -> AIError {
    if e.is_timeout() {
        AIError::Timeout { timeout_secs }
    } else if e.is_connect() {
        AIError::network(format!("Connection failed: {}", e))
    } else {
        AIError::network(e.to_string())
    }
}

/// Maps a non-success HTTP status to a provider error.
fn status_error(status: u16, body: &str, retry_after: Option<u32>) -> AIError {
    match status {
        401 | 403 => AIError::AuthenticationFailed,
        429 => AIError::rate_limited(retry_after.unwrap_or(30)),
        400..=499 => AIError::InvalidRequest(format!("Status {}: {}", status, body)),
        500..=599 => AIError::unavailable(format!("Server error {}: {}", status, body)),
        _ => AIError::network(format!("Unexpected status {}: {}", status, body)),
    }
}

/// Turns an SSE byte stream into text fragments.
///
/// The first error ends the stream.
fn sse_fragments<S, B>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, AIError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        lines: LineBuffer::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.lines.push(chunk.as_ref());
                    state.handle_lines(lines);
                }
                Some(Err(err)) => state.pending.push_back(Err(err)),
                None => {
                    let rest = state.lines.finish();
                    state.handle_lines(rest);
                    state.finished = true;
                }
            }
        }
    }))
}

struct SseState<B> {
    body: Pin<Box<dyn Stream<Item = Result<B, AIError>> + Send>>,
    lines: LineBuffer,
    pending: VecDeque<Result<String, AIError>>,
    finished: bool,
}

impl<B> SseState<B> {
    fn handle_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            match parse_sse_line(&line) {
                SseLine::Fragment(text) => self.pending.push_back(Ok(text)),
                SseLine::Invalid(err) => self.pending.push_back(Err(err)),
                SseLine::Skip => {}
                SseLine::Done => {
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Splits raw bytes into complete lines.
#[derive(Debug, Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(decode_line(&line));
        }
        lines
    }

    /// Returns a trailing line that never got its newline.
    fn finish(&mut self) -> Vec<String> {
        if self.buf.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buf);
        vec![decode_line(&line)]
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c| c == '\r' || c == '\n')
        .to_string()
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Fragment(String),
    Skip,
    Done,
    Invalid(AIError),
}

/// Parses one SSE line.
fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        // Blank separators, comments, event/id fields
        return SseLine::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return SseLine::Done;
    }
    if data.is_empty() {
        return SseLine::Skip;
    }

    match serde_json::from_str::<StreamResponseChunk>(data) {
        Ok(chunk) => match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(content) if !content.is_empty() => SseLine::Fragment(content),
            _ => SseLine::Skip,
        },
        Err(e) => SseLine::Invalid(AIError::parse(format!("Failed to parse SSE chunk: {}", e))),
    }
}

// ----- Chat Completions API Types -----

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponseChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
