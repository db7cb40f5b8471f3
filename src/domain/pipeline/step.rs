//! Prompt steps and the ordered pipeline that holds them.

use serde::{Deserialize, Serialize};

use super::PipelineError;

/// Token replaced with the caller's question when a step is rendered.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// One prompt template in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    prompt_template: String,
}

impl Step {
    /// Creates a step from a prompt template.
    pub fn new(prompt_template: impl Into<String>) -> Self {
        Self {
            prompt_template: prompt_template.into(),
        }
    }

    /// Returns the raw template.
    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    /// Substitutes the first `{question}` token with `question`.
    ///
    /// Only one round of substitution happens, so a question that itself
    /// contains the token is inserted literally.
    pub fn render(&self, question: &str) -> String {
        self.prompt_template.replacen(QUESTION_PLACEHOLDER, question, 1)
    }
}

/// Ordered, immutable list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPipeline {
    steps: Vec<Step>,
}

impl StepPipeline {
    /// Creates a pipeline; the last step becomes the answer step.
    pub fn new(steps: Vec<Step>) -> Result<Self, PipelineError> {
        if steps.is_empty() {
            return Err(PipelineError::NoSteps);
        }
        Ok(Self { steps })
    }

    /// Creates a pipeline from raw templates.
    pub fn from_templates<I, S>(templates: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(templates.into_iter().map(Step::new).collect())
    }

    /// Steps run to completion before the answer step.
    pub fn analysis_steps(&self) -> &[Step] {
        &self.steps[..self.steps.len() - 1]
    }

    /// The final, streamed step.
    pub fn answer_step(&self) -> &Step {
        &self.steps[self.steps.len() - 1]
    }

    /// Total number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for StepPipeline {
    /// Company analysis: industry, then offerings, then the concise answer.
    fn default() -> Self {
        Self {
            steps: vec![
                Step::new(
                    "First, analyze the company based on the domain. What industry are they in?",
                ),
                Step::new(
                    "Based on the previous analysis, what are their main products or services?",
                ),
                Step::new(
                    "Using all previous information, answer this specific question in a very short, \
                     simple, and concise manner, in plain text with no link references: {question}",
                ),
            ],
        }
    }
}
