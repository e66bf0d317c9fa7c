//! End-to-end interpretation of one OCR'd lab report.

use std::sync::Arc;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::chunked::{
    merge_chunk_results, split_into_chunks, ChunkRequest, ChunkingConfig, ExtractionPool,
    PoolConfig, RetryPolicy,
};
use super::collaborators::{HistorySink, ProfileLookup};
use super::extraction::{normalize_document, parse_lab_report, parse_lines, ParsedReport};
use super::structuring::{build_chunk_prompt, sanitize_lines, LlmClient};
use super::synthesis::SynthesisStage;
use super::PipelineError;
use crate::models::{AnalysisInput, ChunkStatus, Interpretation, LabResult, PatientProfile};

/// Tunables for the model-assisted path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub retry: RetryPolicy,
    pub pool: PoolConfig,
}

/// Inbound interpretation request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterpretRequest {
    pub ocr_text: String,
    #[serde(default)]
    pub patient_profile: Option<PatientProfile>,
    #[serde(default)]
    pub draft_analysis_input: Option<AnalysisInput>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl InterpretRequest {
    pub fn new(ocr_text: impl Into<String>) -> Self {
        Self {
            ocr_text: ocr_text.into(),
            ..Self::default()
        }
    }
}

/// Runs both the deterministic parse and the chunked model-assisted
/// interpretation.
pub struct LabReportProcessor {
    config: PipelineConfig,
    model: String,
    pool: ExtractionPool,
    synthesis: SynthesisStage,
    history: Option<Arc<dyn HistorySink>>,
    profiles: Option<Arc<dyn ProfileLookup>>,
}

impl LabReportProcessor {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str, config: PipelineConfig) -> Self {
        Self {
            pool: ExtractionPool::new(llm.clone(), model, config.retry.clone(), config.pool),
            synthesis: SynthesisStage::new(llm, model),
            model: model.to_string(),
            config,
            history: None,
            profiles: None,
        }
    }

    pub fn with_history(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history = Some(sink);
        self
    }

    pub fn with_profiles(mut self, lookup: Arc<dyn ProfileLookup>) -> Self {
        self.profiles = Some(lookup);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Deterministic path only.
    pub fn parse(&self, text: &str) -> ParsedReport {
        parse_lab_report(text)
    }

    /// Full interpretation: chunked extraction, merge, synthesis, persist.
    pub async fn interpret(&self, request: InterpretRequest) -> Result<Interpretation, PipelineError> {
        let span = tracing::info_span!("interpret_report", request_id = %Uuid::new_v4());
        self.interpret_inner(request).instrument(span).await
    }

    async fn interpret_inner(&self, request: InterpretRequest) -> Result<Interpretation, PipelineError> {
        let started = Instant::now();
        let deadline = started + self.config.pool.deadline;

        let lines = normalize_document(&request.ocr_text);
        if lines.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let draft = match request.draft_analysis_input {
            Some(draft) => draft,
            None => parse_lines(lines.clone()).into_analysis_input(PatientProfile::default()),
        };

        let (prompt_lines, removed) = sanitize_lines(&lines);
        if removed > 0 {
            tracing::warn!(removed_lines = removed, "Injection patterns removed from OCR input");
        }
        if prompt_lines.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let profile = self
            .resolve_profile(request.patient_profile, request.user_id.as_deref(), &draft)
            .await;
        let seed = AnalysisInput {
            patient_profile: profile,
            lab_metadata: draft.lab_metadata,
            lab_results: Vec::new(),
        };

        let chunks = split_into_chunks(&prompt_lines, &self.config.chunking);
        let total = chunks.len();
        let requests: Vec<ChunkRequest> = chunks
            .iter()
            .map(|chunk| {
                let hints = hints_for(&draft.lab_results, &chunk.lines);
                ChunkRequest {
                    index: chunk.index,
                    prompt: build_chunk_prompt(
                        chunk.index,
                        total,
                        &chunk.lines,
                        &seed.patient_profile,
                        &hints,
                    ),
                }
            })
            .collect();

        tracing::info!(
            lines = prompt_lines.len(),
            chunks = total,
            draft_results = draft.lab_results.len(),
            "Starting chunked extraction"
        );

        let results = self.pool.run(requests, deadline).await;
        let failed = results
            .iter()
            .filter(|r| r.status == ChunkStatus::Failed)
            .count();
        if failed > 0 {
            tracing::warn!(failed, total, "Some chunks failed extraction");
        }

        let merged = match merge_chunk_results(results, seed) {
            Ok(merged) => merged,
            Err(e) if Instant::now() >= deadline => {
                tracing::warn!(error = %e, "No chunk finished before the deadline");
                return Err(PipelineError::DeadlineExceeded {
                    secs: self.config.pool.deadline.as_secs(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Extraction failed for every chunk");
                return Err(e);
            }
        };

        let narrative = self.synthesis.synthesize(&merged, deadline).await;
        let interpretation = Interpretation {
            analysis_input: merged,
            summary: narrative.summary,
            warnings: narrative.warnings,
            recommendations: narrative.recommendations,
            disclaimer: narrative.disclaimer,
        };

        tracing::info!(
            results = interpretation.analysis_input.lab_results.len(),
            degraded_narrative = narrative.degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Interpretation complete"
        );

        self.persist(request.user_id, &interpretation).await;
        Ok(interpretation)
    }

    /// Explicit profile, then the stored one, then the draft's.
    async fn resolve_profile(
        &self,
        explicit: Option<PatientProfile>,
        user_id: Option<&str>,
        draft: &AnalysisInput,
    ) -> PatientProfile {
        if let Some(profile) = explicit.filter(|p| !p.is_empty()) {
            return profile;
        }

        if let (Some(lookup), Some(user_id)) = (self.profiles.clone(), user_id) {
            let user_id = user_id.to_string();
            match tokio::task::spawn_blocking(move || lookup.lookup(&user_id)).await {
                Ok(Ok(Some(profile))) if !profile.is_empty() => return profile,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Profile lookup failed"),
                Err(e) => tracing::warn!(error = %e, "Profile lookup task aborted"),
            }
        }

        draft.patient_profile.clone()
    }

    /// Hand the interpretation to the history sink. Failures are logged only.
    async fn persist(&self, user_id: Option<String>, interpretation: &Interpretation) {
        let Some(sink) = self.history.clone() else {
            return;
        };
        let record = interpretation.clone();
        let outcome =
            tokio::task::spawn_blocking(move || sink.persist(user_id.as_deref(), &record)).await;
        match outcome {
            Ok(Ok(())) => tracing::debug!("Interpretation persisted"),
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to persist interpretation"),
            Err(e) => tracing::error!(error = %e, "Persistence task aborted"),
        }
    }
}

/// Draft results read from lines inside this chunk. A multi-line row counts
/// when its first line is in the chunk.
fn hints_for(draft: &[LabResult], chunk_lines: &[String]) -> Vec<LabResult> {
    draft
        .iter()
        .filter(|result| {
            chunk_lines.iter().any(|line| {
                !line.is_empty()
                    && (result.line == *line
                        || result
                            .line
                            .strip_prefix(line.as_str())
                            .is_some_and(|rest| rest.starts_with(' ')))
            })
        })
        .cloned()
        .collect()
}
