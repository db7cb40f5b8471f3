//! Mock AI Provider for testing.
//!
//! Provides a configurable mock implementation of the AIProvider port,
//! allowing tests to run without calling real AI APIs.
//!
//! # Features
//!
//! - Pre-configured answers and fragment streams, consumed in call order
//! - Simulated delays for timeout testing
//! - Error injection before or in the middle of a stream
//! - Call tracking for verification
//! - Open stream tracking to verify streams are released
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_answer("true")
//!     .with_stream(["Example.com ", "is a tech company."]);
//!
//! let answer = provider.answer(request).await?;
//! assert_eq!(answer.text, "true");
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{AIError, AIProvider, Answer, AnswerRequest, FragmentStream, ProviderInfo};

/// Mock AI provider for testing.
///
/// Configurable to return specific answers, simulate delays, or inject errors.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    /// Pre-configured responses (consumed in order).
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Provider info to return.
    info: ProviderInfo,
    /// Simulated latency per request.
    delay: Duration,
    /// Call history for verification.
    calls: Arc<Mutex<Vec<MockCall>>>,
    /// Streams handed out and not yet dropped.
    open_streams: Arc<AtomicUsize>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Complete answer text; streamed as a single fragment.
    Answer(String),
    /// Fragments; answered as their concatenation.
    Stream(Vec<String>),
    /// Fragments followed by a mid-stream failure.
    StreamError {
        fragments: Vec<String>,
        error: MockError,
    },
    /// Fail before any output.
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Simulate rate limiting.
    RateLimited { retry_after_secs: u32 },
    /// Simulate provider unavailable.
    Unavailable { message: String },
    /// Simulate authentication failure.
    AuthenticationFailed,
    /// Simulate network error.
    Network { message: String },
    /// Simulate timeout.
    Timeout { timeout_secs: u32 },
    /// Simulate a malformed response.
    Parse { message: String },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::Timeout { timeout_secs } => AIError::Timeout { timeout_secs },
            MockError::Parse { message } => AIError::parse(message),
        }
    }
}

/// Which port operation was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCallKind {
    Answer,
    Stream,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub kind: MockCallKind,
    pub request: AnswerRequest,
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAIProvider {
    /// Creates a new mock provider with default settings.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            info: ProviderInfo::new("mock", "mock-model-1"),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adds a complete answer to the queue.
    pub fn with_answer(self, text: impl Into<String>) -> Self {
        self.with_response(MockResponse::Answer(text.into()))
    }

    /// Adds a fragment stream to the queue.
    pub fn with_stream<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_response(MockResponse::Stream(
            fragments.into_iter().map(Into::into).collect(),
        ))
    }

    /// Adds a stream that fails after yielding `fragments`.
    pub fn with_stream_error<I, S>(self, fragments: I, error: MockError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_response(MockResponse::StreamError {
            fragments: fragments.into_iter().map(Into::into).collect(),
            error,
        })
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: MockError) -> Self {
        self.with_response(MockResponse::Error(error))
    }

    /// Adds any response to the queue.
    pub fn with_response(self, response: MockResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the provider info.
    pub fn with_provider_info(mut self, info: ProviderInfo) -> Self {
        self.info = info;
        self
    }

    /// Returns the number of calls made to this provider.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Returns all recorded calls.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Prompts passed to `answer`, in call order.
    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts_for(MockCallKind::Answer)
    }

    /// Prompts passed to `stream_answer`, in call order.
    pub fn stream_prompts(&self) -> Vec<String> {
        self.prompts_for(MockCallKind::Stream)
    }

    /// Streams handed out that have not been dropped yet.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Clears the call history.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn prompts_for(&self, kind: MockCallKind) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.kind == kind)
            .map(|call| call.request.prompt.clone())
            .collect()
    }

    async fn record(&self, kind: MockCallKind, request: AnswerRequest) {
        self.calls.lock().unwrap().push(MockCall { kind, request });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }

    /// Gets the next response or a default.
    fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::Answer("Mock response".to_string()))
    }

    fn fragment_stream(
        &self,
        fragments: Vec<String>,
        error: Option<MockError>,
    ) -> FragmentStream {
        let guard = OpenStreamGuard::new(self.open_streams.clone());
        let items = fragments
            .into_iter()
            .map(Ok::<String, AIError>)
            .chain(error.map(|e| Err(AIError::from(e))));

        Box::pin(stream::iter(items).map(move |item| {
            let _held = &guard;
            item
        }))
    }
}

/// Counts a stream as open until it is dropped.
#[derive(Debug)]
struct OpenStreamGuard(Arc<AtomicUsize>);

impl OpenStreamGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for OpenStreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AIError> {
        self.record(MockCallKind::Answer, request).await;

        match self.next_response() {
            MockResponse::Answer(text) => Answer::from_text(text),
            MockResponse::Stream(fragments) => Answer::from_text(fragments.concat()),
            MockResponse::StreamError { error, .. } | MockResponse::Error(error) => {
                Err(error.into())
            }
        }
    }

    async fn stream_answer(&self, request: AnswerRequest) -> Result<FragmentStream, AIError> {
        self.record(MockCallKind::Stream, request).await;

        match self.next_response() {
            MockResponse::Answer(text) => Ok(self.fragment_stream(vec![text], None)),
            MockResponse::Stream(fragments) => Ok(self.fragment_stream(fragments, None)),
            MockResponse::StreamError { fragments, error } => {
                Ok(self.fragment_stream(fragments, Some(error)))
            }
            MockResponse::Error(error) => Err(error.into()),
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}
