use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lingodigest::config::{LanguageConfig, LanguageLevel};
use lingodigest::imap_client::SourceMessage;
use lingodigest::llm::{GenerationClient, GenerationError, GlossaryEntry, TransformResult};
use lingodigest::pipeline::{DigestPipeline, MessageOutcome, PipelineError, RunState};

/// Scripted generation backend double. Failures are keyed by markers in the
/// article text; the double also records whether the introduction call ever
/// overlapped an in-flight transform.
struct ScriptedClient {
    rate_limited_marker: Option<&'static str>,
    unauthorized_marker: Option<&'static str>,
    fail_introduction: bool,
    transform_delay_ms: u64,
    in_flight: Arc<AtomicUsize>,
    barrier_violated: Arc<AtomicBool>,
    intro_calls: Arc<AtomicUsize>,
    intro_inputs: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClient {
    fn new() -> Self {
        ScriptedClient {
            rate_limited_marker: None,
            unauthorized_marker: None,
            fail_introduction: false,
            transform_delay_ms: 5,
            in_flight: Arc::new(AtomicUsize::new(0)),
            barrier_violated: Arc::new(AtomicBool::new(false)),
            intro_calls: Arc::new(AtomicUsize::new(0)),
            intro_inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn rewritten(text: &str) -> String {
        format!("rewritten: {}", text.lines().next().unwrap_or(""))
    }
}

impl GenerationClient for ScriptedClient {
    fn transform_article<'a>(
        &'a self,
        text: &'a str,
        _language: &'a LanguageConfig,
    ) -> Pin<Box<dyn Future<Output = Result<TransformResult, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            // Stagger resolution so transforms genuinely overlap
            let delay = if text.contains("SLOW") {
                self.transform_delay_ms * 10
            } else {
                self.transform_delay_ms
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            let result = if self.rate_limited_marker.is_some_and(|m| text.contains(m)) {
                Err(GenerationError::RateLimited)
            } else if self.unauthorized_marker.is_some_and(|m| text.contains(m)) {
                Err(GenerationError::Unauthorized)
            } else {
                Ok(TransformResult {
                    text: Self::rewritten(text),
                    glossary: vec![GlossaryEntry {
                        term: format!("term of {}", text.lines().next().unwrap_or("")),
                        translation: "translation".to_string(),
                    }],
                })
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn generate_introduction<'a>(
        &'a self,
        _language: &'a LanguageConfig,
        article_texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            if self.in_flight.load(Ordering::SeqCst) > 0 {
                self.barrier_violated.store(true, Ordering::SeqCst);
            }
            self.intro_calls.fetch_add(1, Ordering::SeqCst);
            self.intro_inputs
                .lock()
                .unwrap()
                .extend(article_texts.iter().cloned());

            if self.fail_introduction {
                Err(GenerationError::Unreachable("scripted outage".to_string()))
            } else {
                Ok(format!("Introduction covering {} article(s)", article_texts.len()))
            }
        })
    }
}

fn language() -> LanguageConfig {
    LanguageConfig {
        known: "English".to_string(),
        target: "German".to_string(),
        level: LanguageLevel::B1,
    }
}

fn message(uid: u32, body: &str) -> SourceMessage {
    let raw = format!(
        "From: news@example.com\r\n\
         To: reader@example.com\r\n\
         Subject: Newsletter {}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {}",
        uid, body
    );
    SourceMessage {
        uid,
        raw: raw.into_bytes(),
        date: chrono::Utc::now(),
        subject: format!("Newsletter {}", uid),
    }
}

fn body(marker: &str) -> String {
    format!("{} article body with enough characters to pass extraction.", marker)
}

#[tokio::test]
async fn test_all_success_marks_every_message_safe() {
    let client = Arc::new(ScriptedClient::new());
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![
        message(1, &body("First")),
        message(2, &body("Second")),
        message(3, &body("Third")),
    ];

    let report = pipeline.run(&batch).await.expect("run should succeed");

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.result.safe_uids(), vec![1, 2, 3]);

    // Exactly one rendered block per article, in original order
    assert_eq!(report.digest.articles.len(), 3);
    assert!(report.digest.articles[0].text.contains("First"));
    assert!(report.digest.articles[1].text.contains("Second"));
    assert!(report.digest.articles[2].text.contains("Third"));
    assert_eq!(report.digest.introduction, "Introduction covering 3 article(s)");
}

#[tokio::test]
async fn test_single_failure_is_isolated() {
    let mut scripted = ScriptedClient::new();
    scripted.rate_limited_marker = Some("Poisoned");
    let client = Arc::new(scripted);
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![
        message(1, &body("First")),
        message(2, &body("Poisoned")),
        message(3, &body("Third")),
    ];

    let report = pipeline.run(&batch).await.expect("run should still succeed");

    assert_eq!(report.state, RunState::PartiallyFailed);
    assert_eq!(report.result.safe_uids(), vec![1, 3]);
    assert!(matches!(
        report.result.outcome(2),
        Some(MessageOutcome::Failed(_))
    ));

    // The failed article is excluded, siblings keep their order
    assert_eq!(report.digest.articles.len(), 2);
    assert!(report.digest.articles[0].text.contains("First"));
    assert!(report.digest.articles[1].text.contains("Third"));
    assert!(!report.digest.body.contains("Poisoned"));
}

#[tokio::test]
async fn test_introduction_waits_for_all_transforms() {
    let client = Arc::new(ScriptedClient::new());
    let pipeline = DigestPipeline::new(language(), client.clone());

    // One deliberately slow transform; the introduction must still observe
    // zero in-flight transforms when it starts
    let batch = vec![
        message(1, &body("SLOW first")),
        message(2, &body("Second")),
        message(3, &body("Third")),
    ];

    let report = pipeline.run(&batch).await.expect("run should succeed");

    assert!(
        !client.barrier_violated.load(Ordering::SeqCst),
        "introduction was generated while a transform was still pending"
    );
    assert_eq!(client.intro_calls.load(Ordering::SeqCst), 1);

    // The introduction saw the full ordered list of surviving texts
    let inputs = client.intro_inputs.lock().unwrap();
    assert_eq!(inputs.len(), 3);
    assert!(inputs[0].contains("SLOW first"));
    assert_eq!(report.digest.articles.len(), 3);
}

#[tokio::test]
async fn test_zero_survivors_is_wholesale_failure() {
    let mut scripted = ScriptedClient::new();
    scripted.rate_limited_marker = Some("article");
    let client = Arc::new(scripted);
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![message(1, &body("First")), message(2, &body("Second"))];

    let result = pipeline.run(&batch).await;

    assert!(matches!(result, Err(PipelineError::NoSurvivors)));
    // No digest with no content: the introduction call is never made
    assert_eq!(client.intro_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_contentless_batch_fails_without_backend_calls() {
    let client = Arc::new(ScriptedClient::new());
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![message(1, ""), message(2, "  ")];

    let result = pipeline.run(&batch).await;

    assert!(matches!(result, Err(PipelineError::NoContent)));
    assert_eq!(client.intro_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_contentless_message_is_skipped_not_failed() {
    let client = Arc::new(ScriptedClient::new());
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![message(1, &body("First")), message(2, "")];

    let report = pipeline.run(&batch).await.expect("run should succeed");

    // Skipped is not an error: the run completes, but the contentless
    // message is excluded from the safe set
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.result.safe_uids(), vec![1]);
    assert_eq!(report.result.outcome(2), Some(&MessageOutcome::Skipped));
}

#[tokio::test]
async fn test_multi_article_message_rollup() {
    let mut scripted = ScriptedClient::new();
    scripted.rate_limited_marker = Some("Poisoned");
    let client = Arc::new(scripted);
    let pipeline = DigestPipeline::new(language(), client.clone());

    // Message 1 carries two articles, one of which fails: the surviving
    // sibling stays in the digest but the message is no longer safe
    let two_articles = format!("{}\n---\n{}", body("Good sibling"), body("Poisoned"));
    let batch = vec![message(1, &two_articles), message(2, &body("Second"))];

    let report = pipeline.run(&batch).await.expect("run should succeed");

    assert_eq!(report.state, RunState::PartiallyFailed);
    assert_eq!(report.result.safe_uids(), vec![2]);
    assert!(matches!(
        report.result.outcome(1),
        Some(MessageOutcome::Failed(_))
    ));

    assert_eq!(report.digest.articles.len(), 2);
    assert!(report.digest.articles[0].text.contains("Good sibling"));
    assert!(report.digest.articles[1].text.contains("Second"));
}

#[tokio::test]
async fn test_introduction_failure_is_fatal() {
    let mut scripted = ScriptedClient::new();
    scripted.fail_introduction = true;
    let client = Arc::new(scripted);
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![message(1, &body("First"))];

    let result = pipeline.run(&batch).await;

    assert!(matches!(result, Err(PipelineError::Introduction(_))));
}

#[tokio::test]
async fn test_run_timeout_aborts_the_whole_run() {
    let mut scripted = ScriptedClient::new();
    // Transforms that take far longer than the run timeout
    scripted.transform_delay_ms = 5_000;
    let client = Arc::new(scripted);
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![message(1, &body("First"))];

    let result = pipeline.run_with_timeout(&batch, 1).await;

    assert!(matches!(result, Err(PipelineError::Timeout(1))));
    assert_eq!(client.intro_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_end_to_end_rate_limited_scenario() {
    // 3 messages, one article each, article 2 rate limited
    let mut scripted = ScriptedClient::new();
    scripted.rate_limited_marker = Some("Second");
    let client = Arc::new(scripted);
    let pipeline = DigestPipeline::new(language(), client.clone());

    let batch = vec![
        message(1, &body("First")),
        message(2, &body("Second")),
        message(3, &body("Third")),
    ];

    let report = pipeline.run(&batch).await.expect("a partial digest is still produced");

    assert_eq!(report.state, RunState::PartiallyFailed);
    assert_eq!(report.result.safe_uids(), vec![1, 3]);
    assert!(report.result.outcome(2).is_some());
    assert!(!report.result.safe_uids().contains(&2));

    assert_eq!(report.digest.articles.len(), 2);
    assert!(report.digest.body.contains("First"));
    assert!(report.digest.body.contains("Third"));
    assert!(!report.digest.body.contains("Second article body"));

    // The partial digest is a deliverable document
    assert!(report.digest.body.starts_with("# Your Newsletter Digest\n"));
}
