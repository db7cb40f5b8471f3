//! Step pipeline for multi-step answers.
//!
//! A pipeline is a fixed, ordered list of prompt templates. Every step but the
//! last is an analysis step whose answer feeds the [`AnalysisContext`]; the
//! last step produces the user-facing answer.

mod context;
mod step;

pub use context::AnalysisContext;
pub use step::{Step, StepPipeline, QUESTION_PLACEHOLDER};

use thiserror::Error;

/// Errors raised while building a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("pipeline requires at least one step")]
    NoSteps,
}
