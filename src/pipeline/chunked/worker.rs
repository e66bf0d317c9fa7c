use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;

use super::retry::RetryPolicy;
use crate::models::{AnalysisInput, ChunkResult};
use crate::pipeline::structuring::{
    parse_chunk_response, GenerationOptions, LlmClient, CHUNK_SYSTEM_PROMPT,
};

/// Fan-out limits for one interpretation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    /// Chunks extracted at the same time.
    pub max_concurrency: usize,
    /// Overall budget for one interpretation, fan-out and synthesis included.
    pub deadline: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            deadline: Duration::from_secs(crate::config::DEFAULT_DEADLINE_SECS),
        }
    }
}

/// A ready-to-send extraction request for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRequest {
    pub index: usize,
    pub prompt: String,
}

/// Bounded worker pool running chunk extractions concurrently.
pub struct ExtractionPool {
    llm: Arc<dyn LlmClient>,
    model: String,
    retry: RetryPolicy,
    config: PoolConfig,
}

impl ExtractionPool {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str, retry: RetryPolicy, config: PoolConfig) -> Self {
        Self {
            llm,
            model: model.to_string(),
            retry,
            config,
        }
    }

    /// Extract every chunk and return one result per request, ordered by
    /// index. Chunks still running at `deadline` are abandoned and reported
    /// as failed.
    pub async fn run(&self, requests: Vec<ChunkRequest>, deadline: Instant) -> Vec<ChunkResult> {
        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for request in requests {
            let semaphore = semaphore.clone();
            let llm = self.llm.clone();
            let model = self.model.clone();
            let retry = self.retry.clone();
            let index = request.index;
            let span = tracing::info_span!("extract_chunk", chunk = index);

            join_set.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return ChunkResult::failed(index);
                    };
                    let span = tracing::Span::current();
                    let outcome = tokio::task::spawn_blocking(move || {
                        span.in_scope(|| extract_chunk(llm.as_ref(), &model, &retry, &request))
                    })
                    .await;

                    match outcome {
                        Ok(Some(partial)) => ChunkResult::succeeded(index, partial),
                        Ok(None) => ChunkResult::failed(index),
                        Err(e) => {
                            tracing::warn!(chunk = index, error = %e, "Chunk worker aborted");
                            ChunkResult::failed(index)
                        }
                    }
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<ChunkResult>> = vec![None; total];
        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(result))) => {
                    if let Some(slot) = slots.get_mut(result.index) {
                        *slot = Some(result);
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Chunk task failed to join");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        pending = join_set.len(),
                        total,
                        "Extraction deadline reached, abandoning unfinished chunks"
                    );
                    join_set.abort_all();
                    break;
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| ChunkResult::failed(index)))
            .collect()
    }
}

/// Blocking extraction of one chunk with the retry schedule. `None` once
/// every attempt has failed.
pub fn extract_chunk(
    llm: &dyn LlmClient,
    model: &str,
    retry: &RetryPolicy,
    request: &ChunkRequest,
) -> Option<AnalysisInput> {
    let attempts = retry.attempts();

    for attempt in 0..attempts {
        let options = GenerationOptions::json(retry.temperature_for(attempt));
        let outcome = llm
            .generate(model, &request.prompt, CHUNK_SYSTEM_PROMPT, &options)
            .and_then(|response| parse_chunk_response(&response));

        match outcome {
            Ok(partial) => {
                tracing::debug!(
                    chunk = request.index,
                    attempt = attempt + 1,
                    results = partial.lab_results.len(),
                    "Chunk extracted"
                );
                return Some(partial);
            }
            Err(e) if (e.is_retryable() || e.is_parse_error()) && attempt + 1 < attempts => {
                tracing::warn!(
                    chunk = request.index,
                    attempt = attempt + 1,
                    error = %e,
                    "Chunk extraction failed, retrying"
                );
                if !retry.backoff.is_zero() {
                    std::thread::sleep(retry.backoff);
                }
            }
            Err(e) => {
                tracing::warn!(
                    chunk = request.index,
                    attempt = attempt + 1,
                    error = %e,
                    "Chunk extraction failed"
                );
                return None;
            }
        }
    }
    None
}
