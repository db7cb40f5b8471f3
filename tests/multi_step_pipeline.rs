//! Integration tests for the multi-step answer pipeline.
//!
//! These tests drive `MultiStepProcessor` through the public API with the
//! mock provider and verify:
//! 1. Analysis steps run in order, each seeing all previous answers
//! 2. The answer step streams normalized fragments in arrival order
//! 3. Failures abort early or surface in the stream where they happen
//! 4. Streams are released on completion, error and early drop

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use company_insight::adapters::ai::{MockAIProvider, MockCallKind, MockError};
use company_insight::application::{MultiStepProcessor, RetryPolicy};
use company_insight::domain::{normalize, StepPipeline};
use company_insight::ports::{
    collect_fragments, AIError, AIProvider, Answer, AnswerRequest, FragmentStream, ProviderInfo,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const LEGIT_STEP: &str = "Is it legit? true/false";
const INDUSTRY_STEP: &str = "What industry? or false";
const ANSWER_STEP: &str = "Answer: {question}. Otherwise explain not legitimate.";

fn three_step_processor(provider: &MockAIProvider) -> MultiStepProcessor {
    MultiStepProcessor::new(
        Arc::new(provider.clone()),
        StepPipeline::from_templates([LEGIT_STEP, INDUSTRY_STEP, ANSWER_STEP]).unwrap(),
    )
    .with_retry_policy(RetryPolicy::none())
}

async fn drain(stream: FragmentStream) -> Vec<Result<String, AIError>> {
    stream.collect().await
}

/// Answers with the prompt's last line and streams the prompt back.
struct EchoProvider;

#[async_trait]
impl AIProvider for EchoProvider {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AIError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let last_line = request.prompt.lines().last().unwrap_or_default();
        Answer::from_text(format!("echo:{}", last_line))
    }

    async fn stream_answer(&self, request: AnswerRequest) -> Result<FragmentStream, AIError> {
        Ok(Box::pin(stream::iter(vec![Ok(request.prompt)])))
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("echo", "echo-1")
    }
}

// =============================================================================
// End-to-end scenario
// =============================================================================

#[tokio::test]
async fn legitimacy_industry_answer_scenario() {
    let provider = MockAIProvider::new()
        .with_answer("true")
        .with_answer("Technology industry.")
        .with_stream(["Example.com ", "is a tech company."]);
    let processor = three_step_processor(&provider);

    let stream = processor
        .process("What does example.com do?", "example.com")
        .await
        .unwrap();
    let fragments = drain(stream).await;

    assert_eq!(
        provider.answer_prompts(),
        vec![
            "Analyzing example.com:\n\n\nIs it legit? true/false".to_string(),
            "Analyzing example.com:\n\ntrue\n\nWhat industry? or false".to_string(),
        ]
    );
    assert_eq!(
        provider.stream_prompts(),
        vec![
            "Analyzing example.com:\n\ntrue\nTechnology industry.\n\n\
             Answer: What does example.com do?. Otherwise explain not legitimate."
                .to_string()
        ]
    );
    assert_eq!(
        fragments,
        vec![
            Ok("Example.com ".to_string()),
            Ok("is a tech company.".to_string())
        ]
    );
}

// =============================================================================
// Step order and context accumulation
// =============================================================================

#[tokio::test]
async fn answer_calls_precede_single_stream_call() {
    let provider = MockAIProvider::new()
        .with_answer("one")
        .with_answer("two")
        .with_stream(["three"]);
    let processor = three_step_processor(&provider);

    let stream = processor.process("q", "d").await.unwrap();
    drain(stream).await;

    let kinds: Vec<_> = provider.get_calls().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![MockCallKind::Answer, MockCallKind::Answer, MockCallKind::Stream]
    );
}

#[tokio::test]
async fn each_prompt_carries_all_previous_answers() {
    let provider = MockAIProvider::new()
        .with_answer("FIRST-ANSWER")
        .with_answer("SECOND-ANSWER")
        .with_stream(["x"]);
    let processor = three_step_processor(&provider);

    let stream = processor.process("q", "d").await.unwrap();
    drain(stream).await;

    let answer_prompts = provider.answer_prompts();
    assert!(answer_prompts[1].contains("FIRST-ANSWER"));

    let final_prompt = &provider.stream_prompts()[0];
    let first = final_prompt.find("FIRST-ANSWER").unwrap();
    let second = final_prompt.find("SECOND-ANSWER").unwrap();
    assert!(first < second);
    assert!(final_prompt.starts_with("Analyzing d:\n"));
}

#[tokio::test]
async fn question_is_substituted_exactly_once() {
    let question = format!("Ünïcode 🚀 \"quotes\" {{braces}} {}", "x".repeat(1000));
    let provider = MockAIProvider::new()
        .with_answer("a")
        .with_answer("b")
        .with_stream(["c"]);
    let processor = three_step_processor(&provider);

    let stream = processor.process(&question, "d").await.unwrap();
    drain(stream).await;

    let final_prompt = &provider.stream_prompts()[0];
    assert_eq!(final_prompt.matches(question.as_str()).count(), 1);
    assert!(!final_prompt.contains("{question}"));
    assert!(provider
        .answer_prompts()
        .iter()
        .all(|p| !p.contains(question.as_str())));
}

#[tokio::test]
async fn empty_question_and_domain_run_full_pipeline() {
    let provider = MockAIProvider::new()
        .with_answer("industry")
        .with_answer("products")
        .with_stream(["answer"]);
    let processor = MultiStepProcessor::new(Arc::new(provider.clone()), StepPipeline::default());

    let stream = processor.process("", "").await.unwrap();
    let text = collect_fragments(stream).await.unwrap();

    assert_eq!(text, "answer");
    assert_eq!(provider.answer_prompts().len(), 2);
    assert!(provider.stream_prompts()[0].starts_with("Analyzing :\n"));
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn clean_fragments_pass_through_unchanged() {
    let emitted = ["Acme ", "builds 🚀 rockets.\n", "- fast\n", "1. reliable"];
    let provider = MockAIProvider::new()
        .with_answer("a")
        .with_answer("b")
        .with_stream(emitted);
    let processor = three_step_processor(&provider);

    let stream = processor.process("q", "acme.example").await.unwrap();
    let yielded: Vec<String> = drain(stream).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(yielded, emitted);
    assert_eq!(yielded.concat(), emitted.concat());
}

#[tokio::test]
async fn each_fragment_is_normalized_on_its_own() {
    let emitted = ["# Acme\n", "**Acme** [1] makes ", "anvils (2) .", "**split", " marker**"];
    let provider = MockAIProvider::new()
        .with_answer("a")
        .with_answer("b")
        .with_stream(emitted);
    let processor = three_step_processor(&provider);

    let stream = processor.process("q", "acme.example").await.unwrap();
    let yielded: Vec<String> = drain(stream).await.into_iter().map(Result::unwrap).collect();

    let expected: Vec<String> = emitted.iter().map(|f| normalize(f)).collect();
    assert_eq!(yielded, expected);
    assert_eq!(yielded[3], "**split");
}

#[tokio::test]
async fn stream_is_released_after_completion() {
    let provider = MockAIProvider::new()
        .with_answer("a")
        .with_answer("b")
        .with_stream(["x", "y"]);
    let processor = three_step_processor(&provider);

    let stream = processor.process("q", "d").await.unwrap();
    assert_eq!(provider.open_streams(), 1);

    drain(stream).await;
    assert_eq!(provider.open_streams(), 0);
}

#[tokio::test]
async fn abandoning_the_stream_releases_it() {
    let provider = MockAIProvider::new()
        .with_answer("a")
        .with_answer("b")
        .with_stream(["one", "two", "three"]);
    let processor = three_step_processor(&provider);

    let mut stream = processor.process("q", "d").await.unwrap();
    assert_eq!(stream.next().await, Some(Ok("one".to_string())));
    assert_eq!(provider.open_streams(), 1);

    drop(stream);
    assert_eq!(provider.open_streams(), 0);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn first_step_failure_aborts_before_streaming() {
    let provider = MockAIProvider::new()
        .with_error(MockError::Network {
            message: "unreachable".to_string(),
        })
        .with_answer("unused")
        .with_stream(["never"]);
    let processor = three_step_processor(&provider);

    let result = processor.process("q", "d").await;

    assert!(matches!(result, Err(AIError::Network(_))));
    assert_eq!(provider.answer_prompts().len(), 1);
    assert!(provider.stream_prompts().is_empty());
    assert_eq!(provider.open_streams(), 0);
}

#[tokio::test]
async fn second_step_failure_skips_remaining_steps() {
    let provider = MockAIProvider::new()
        .with_answer("true")
        .with_error(MockError::Parse {
            message: "unexpected shape".to_string(),
        })
        .with_stream(["never"]);
    let processor = three_step_processor(&provider);

    let result = processor.process("q", "d").await;

    assert!(matches!(result, Err(AIError::Parse(_))));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn empty_analysis_answer_is_an_error() {
    let provider = MockAIProvider::new().with_answer("").with_stream(["never"]);
    let processor = three_step_processor(&provider);

    let result = processor.process("q", "d").await;

    assert!(matches!(result, Err(AIError::EmptyResponse)));
    assert!(provider.stream_prompts().is_empty());
}

#[tokio::test]
async fn whitespace_analysis_answer_is_kept_verbatim() {
    let provider = MockAIProvider::new()
        .with_answer(" \n")
        .with_answer("Technology industry.")
        .with_stream(["ok"]);
    let processor = three_step_processor(&provider);

    let stream = processor.process("q", "d").await.unwrap();
    drain(stream).await;

    assert_eq!(provider.call_count(), 3);
    assert_eq!(
        provider.answer_prompts()[1],
        "Analyzing d:\n\n \n\n\nWhat industry? or false"
    );
}

#[tokio::test]
async fn mid_stream_failure_keeps_delivered_fragments() {
    let provider = MockAIProvider::new()
        .with_answer("a")
        .with_answer("b")
        .with_stream_error(
            ["Example.com ", "is a "],
            MockError::Timeout { timeout_secs: 30 },
        );
    let processor = three_step_processor(&provider);

    let stream = processor.process("q", "d").await.unwrap();
    let fragments = drain(stream).await;

    assert_eq!(
        fragments,
        vec![
            Ok("Example.com ".to_string()),
            Ok("is a ".to_string()),
            Err(AIError::Timeout { timeout_secs: 30 }),
        ]
    );
    assert_eq!(provider.open_streams(), 0);
}

#[tokio::test]
async fn retry_recovers_transient_step_failure() {
    let provider = MockAIProvider::new()
        .with_error(MockError::RateLimited { retry_after_secs: 1 })
        .with_answer("true")
        .with_answer("Technology industry.")
        .with_stream(["ok"]);
    let processor = three_step_processor(&provider)
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1)));

    let stream = processor.process("q", "d").await.unwrap();

    assert_eq!(collect_fragments(stream).await.unwrap(), "ok");
    let prompts = provider.answer_prompts();
    assert_eq!(prompts.len(), 3);
    assert_eq!(prompts[0], prompts[1]);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn concurrent_runs_keep_separate_context() {
    let processor = Arc::new(MultiStepProcessor::new(
        Arc::new(EchoProvider),
        StepPipeline::from_templates(["first", "second", "final {question}"]).unwrap(),
    ));

    let (left, right) = tokio::join!(
        async {
            let stream = processor.process("left?", "left.example").await.unwrap();
            collect_fragments(stream).await.unwrap()
        },
        async {
            let stream = processor.process("right?", "right.example").await.unwrap();
            collect_fragments(stream).await.unwrap()
        }
    );

    assert_eq!(
        left,
        "Analyzing left.example:\n\necho:first\necho:second\n\nfinal left?"
    );
    assert_eq!(
        right,
        "Analyzing right.example:\n\necho:first\necho:second\n\nfinal right?"
    );
}
