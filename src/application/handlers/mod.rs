//! Command handlers.
//!
//! - `MultiStepProcessor` - Multi-step answer to a question about a domain

mod multi_step_processor;

pub use multi_step_processor::{MultiStepProcessor, RetryPolicy};
