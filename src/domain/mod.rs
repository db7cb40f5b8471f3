//! Domain layer containing the pipeline model and text rules.
//!
//! # Module Organization
//!
//! - `pipeline` - Prompt steps, the ordered step pipeline and the per-run context
//! - `normalizer` - Markdown and citation stripping for streamed fragments

pub mod normalizer;
pub mod pipeline;

pub use normalizer::normalize;
pub use pipeline::{AnalysisContext, PipelineError, Step, StepPipeline};
