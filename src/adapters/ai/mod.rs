//! AI Provider Adapters.
//!
//! Implementations of the AIProvider port.
//!
//! ## Available Adapters
//!
//! - `MockAIProvider` - Configurable mock for testing
//! - `PerplexityProvider` - Perplexity chat completions with SSE streaming

mod mock_provider;
mod perplexity_provider;

pub use mock_provider::{MockAIProvider, MockCall, MockCallKind, MockError, MockResponse};
pub use perplexity_provider::{PerplexityConfig, PerplexityProvider, DEFAULT_SYSTEM_PROMPT};
