use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::LanguageConfig;
use crate::digest::{Digest, DIGEST_TITLE};
use crate::extractor::{self, Article};
use crate::imap_client::SourceMessage;
use crate::llm::{GenerationClient, GenerationError, TransformResult};

/// Fatal pipeline failures. Per-article generation failures are not here:
/// they are captured in the owning message's outcome and never abort the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("the batch yielded no articles")]
    NoContent,
    #[error("no article survived transformation")]
    NoSurvivors,
    #[error("introduction generation failed: {0}")]
    Introduction(GenerationError),
    #[error("run aborted after {0}s timeout")]
    Timeout(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Completed,
    PartiallyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Every extracted article transformed successfully;
    /// the message may be marked processed after delivery
    Safe,
    /// At least one of the message's articles failed transformation
    Failed(String),
    /// Extraction yielded nothing; skipped, not an error
    Skipped,
}

/// Per-source-message outcome of one run, in batch order.
/// Sole input of the caller's delivery/cleanup decisions.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub outcomes: Vec<(u32, MessageOutcome)>,
}

impl RunResult {
    /// Identifiers safe to mark processed once delivery is confirmed
    pub fn safe_uids(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, MessageOutcome::Safe))
            .map(|(uid, _)| *uid)
            .collect()
    }

    pub fn failed(&self) -> Vec<(u32, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(uid, outcome)| match outcome {
                MessageOutcome::Failed(reason) => Some((*uid, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self, uid: u32) -> Option<&MessageOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == uid)
            .map(|(_, outcome)| outcome)
    }
}

/// Outcome record of a successful (possibly partial) run
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub digest: Digest,
    pub result: RunResult,
}

/// Drives one batch through extraction, per-article transformation, the
/// introduction barrier, and digest assembly.
///
/// Owns nothing beyond one invocation: every collection built here dies with
/// the run. Never touches the source mailbox or the delivery transport.
pub struct DigestPipeline {
    language: LanguageConfig,
    client: Arc<dyn GenerationClient>,
}

impl DigestPipeline {
    pub fn new(language: LanguageConfig, client: Arc<dyn GenerationClient>) -> Self {
        DigestPipeline { language, client }
    }

    /// Run the pipeline under a run-level timeout. An elapsed timeout is a
    /// total failure: no digest, no outcomes, nothing for the caller to commit.
    pub async fn run_with_timeout(
        &self,
        batch: &[SourceMessage],
        timeout_secs: u64,
    ) -> Result<RunReport, PipelineError> {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), self.run(batch)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(timeout_secs)),
        }
    }

    pub async fn run(&self, batch: &[SourceMessage]) -> Result<RunReport, PipelineError> {
        info!("🚀 Pipeline run over {} source message(s)", batch.len());

        // 1. Extracting: one ordered sequence across all sources
        //    (per-source article order, then arrival order)
        let mut articles: Vec<Article> = Vec::new();
        let mut contentless: Vec<u32> = Vec::new();

        for message in batch {
            let extracted = extractor::extract_articles(message);
            if extracted.is_empty() {
                info!("Email {} skipped, no content", message.uid);
                contentless.push(message.uid);
            } else {
                debug!("Email {} yielded {} article(s)", message.uid, extracted.len());
                articles.extend(extracted);
            }
        }

        if articles.is_empty() {
            return Err(PipelineError::NoContent);
        }

        // 2. Transforming: independent fan-out, one task per article.
        //    A failed article is excluded from the digest; siblings continue.
        info!("Dispatching {} transform call(s)", articles.len());
        let transforms = articles
            .iter()
            .map(|article| self.client.transform_article(&article.body, &self.language));

        // 3. The join is the barrier: nothing past this line runs until every
        //    transform has resolved, success or failure.
        let transform_results = futures::future::join_all(transforms).await;

        let mut survivors: Vec<TransformResult> = Vec::new();
        let mut failures: HashMap<u32, Vec<String>> = HashMap::new();
        let mut failed_articles = 0usize;

        for (article, result) in articles.iter().zip(transform_results) {
            match result {
                Ok(transformed) => survivors.push(transformed),
                Err(e) => {
                    warn!(
                        "Transform failed for article {} of email {}: {}",
                        article.index, article.source_uid, e
                    );
                    failed_articles += 1;
                    failures
                        .entry(article.source_uid)
                        .or_default()
                        .push(e.to_string());
                }
            }
        }

        info!(
            "Transforms resolved: {} succeeded, {} failed",
            survivors.len(),
            failed_articles
        );

        if survivors.is_empty() {
            // No digest with no content; the introduction call is never made
            return Err(PipelineError::NoSurvivors);
        }

        // 4. Introducing: depends on the full ordered list of survivors.
        //    A failure here is fatal, there is no digest without introduction.
        let survivor_texts: Vec<String> = survivors.iter().map(|r| r.text.clone()).collect();
        let introduction = self
            .client
            .generate_introduction(&self.language, &survivor_texts)
            .await
            .map_err(PipelineError::Introduction)?;

        // 5. Assembling: pure, cannot fail with validated inputs
        let digest = Digest::new(DIGEST_TITLE, introduction, survivors);

        // 6. Roll up per-message outcomes in batch order: a message is safe
        //    only if it produced articles and every one of them succeeded
        let mut outcomes: Vec<(u32, MessageOutcome)> = Vec::new();
        for message in batch {
            let outcome = if contentless.contains(&message.uid) {
                MessageOutcome::Skipped
            } else if let Some(reasons) = failures.get(&message.uid) {
                MessageOutcome::Failed(reasons.join("; "))
            } else {
                MessageOutcome::Safe
            };
            outcomes.push((message.uid, outcome));
        }

        let state = if failures.is_empty() {
            RunState::Completed
        } else {
            RunState::PartiallyFailed
        };

        match state {
            RunState::Completed => info!("✅ Pipeline run completed"),
            RunState::PartiallyFailed => warn!(
                "⚠️  Pipeline run partially failed: {} message(s) not fully processed",
                failures.len()
            ),
        }

        Ok(RunReport {
            state,
            digest,
            result: RunResult { outcomes },
        })
    }
}
