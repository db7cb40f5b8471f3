//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application and the outside world. Adapters implement these ports.
//!
//! - `AIProvider` - Text-generation backend (single answer or fragment stream)

mod ai_provider;

pub use ai_provider::{
    collect_fragments, AIError, AIProvider, Answer, AnswerRequest, FragmentStream, ProviderInfo,
};
