//! MultiStepProcessor - Answers a question through the step pipeline.
//!
//! Analysis steps run one after another, each awaited to completion, and their
//! raw answers accumulate in an [`AnalysisContext`]. The answer step is
//! streamed and every fragment is normalized before it reaches the caller.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, Span};

use crate::config::PipelineConfig;
use crate::domain::{normalize, AnalysisContext, StepPipeline};
use crate::ports::{AIError, AIProvider, Answer, AnswerRequest, FragmentStream};

/// Retry policy for analysis steps.
///
/// Only retryable errors are retried. The streamed answer step is never
/// retried because fragments may already have reached the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per analysis step, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` below one is treated as one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt per step.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self::new(config.max_step_attempts, config.retry_backoff())
    }
}

/// Orchestrates one provider over a fixed step pipeline.
///
/// Holds no per-call state, so one processor can serve concurrent calls.
pub struct MultiStepProcessor {
    provider: Arc<dyn AIProvider>,
    pipeline: StepPipeline,
    retry: RetryPolicy,
}

impl MultiStepProcessor {
    pub fn new(provider: Arc<dyn AIProvider>, pipeline: StepPipeline) -> Self {
        Self {
            provider,
            pipeline,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy for analysis steps.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Answers `question` about `domain`.
    ///
    /// Analysis step failures are returned before any fragment exists. Once
    /// the answer stream is returned, a provider failure arrives as an `Err`
    /// item and ends the stream. Dropping the stream releases the provider
    /// stream. Stream events are recorded under the same `run_id` span.
    #[tracing::instrument(
        name = "multi_step_process",
        skip(self, question),
        fields(run_id = %uuid::Uuid::new_v4(), steps = self.pipeline.len())
    )]
    pub async fn process(&self, question: &str, domain: &str) -> Result<FragmentStream, AIError> {
        let mut context = AnalysisContext::new(domain);

        for (index, step) in self.pipeline.analysis_steps().iter().enumerate() {
            let prompt = context.prompt_for(&step.render(question));
            let answer = self
                .run_analysis_step(index + 1, AnswerRequest::new(prompt, ""))
                .await?;

            tracing::debug!(
                step = index + 1,
                response_bytes = answer.text.len(),
                "Analysis step complete"
            );
            context.append(&answer.text);
        }

        let prompt = context.prompt_for(&self.pipeline.answer_step().render(question));
        tracing::info!(
            provider = %self.provider.provider_info().name,
            prompt_bytes = prompt.len(),
            "Streaming final answer"
        );
        let fragments = self
            .provider
            .stream_answer(AnswerRequest::new(prompt, domain))
            .await?;

        Ok(normalized(fragments, Span::current()))
    }

    async fn run_analysis_step(
        &self,
        step: usize,
        request: AnswerRequest,
    ) -> Result<Answer, AIError> {
        let mut attempt = 1;
        loop {
            match self.provider.answer(request.clone()).await {
                Ok(answer) => return Ok(answer),
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    tracing::warn!(step, attempt, error = %err, "Analysis step failed, retrying");
                    if !self.retry.backoff.is_zero() {
                        sleep(self.retry.backoff).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(step, attempt, error = %err, "Analysis step failed");
                    return Err(err);
                }
            }
        }
    }
}

/// Normalizes each fragment and ends the stream after the first error.
fn normalized(fragments: FragmentStream, span: Span) -> FragmentStream {
    Box::pin(stream::unfold(Some(fragments), move |state| {
        async move {
            let mut fragments = state?;
            match fragments.next().await {
                Some(Ok(fragment)) => Some((Ok(normalize(&fragment)), Some(fragments))),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "Answer stream failed");
                    Some((Err(err), None))
                }
                None => None,
            }
        }
        .instrument(span.clone())
    }))
}
