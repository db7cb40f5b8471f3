//! Application layer - Use cases coordinating domain logic and ports.

pub mod handlers;

pub use handlers::{MultiStepProcessor, RetryPolicy};
