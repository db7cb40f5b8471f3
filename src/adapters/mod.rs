//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `ai` - Text-generation providers (Perplexity, mock)

pub mod ai;

pub use ai::{MockAIProvider, MockError, PerplexityConfig, PerplexityProvider};
