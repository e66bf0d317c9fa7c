use crate::models::{AnalysisInput, ChunkResult, LabMetadata, PatientProfile};
use crate::pipeline::PipelineError;

/// Fold chunk results into one analysis input.
///
/// Results are concatenated in chunk order with no dedup; overlapping
/// chunks may repeat a row. Profile and each metadata field are
/// first-writer-wins: `seed` writes first, then chunks by index. Statuses
/// are recomputed wherever value and range allow it.
pub fn merge_chunk_results(
    mut results: Vec<ChunkResult>,
    seed: AnalysisInput,
) -> Result<AnalysisInput, PipelineError> {
    let total = results.len();
    results.sort_by_key(|r| r.index);

    let partials: Vec<AnalysisInput> = results
        .into_iter()
        .filter(ChunkResult::is_ok)
        .filter_map(|r| r.partial)
        .collect();

    if partials.is_empty() {
        return Err(PipelineError::TotalExtractionFailure { chunks: total });
    }
    let succeeded = partials.len();

    let mut merged = AnalysisInput {
        patient_profile: seed.patient_profile,
        lab_metadata: seed.lab_metadata,
        lab_results: Vec::new(),
    };

    for partial in partials {
        merge_profile(&mut merged.patient_profile, partial.patient_profile);
        merge_metadata(&mut merged.lab_metadata, partial.lab_metadata);
        merged.lab_results.extend(partial.lab_results);
    }

    for result in &mut merged.lab_results {
        result.recompute_status();
        result.normalize_value_fields();
    }

    tracing::debug!(
        chunks = total,
        succeeded,
        results = merged.lab_results.len(),
        "Chunk results merged"
    );
    Ok(merged)
}

fn merge_profile(current: &mut PatientProfile, candidate: PatientProfile) {
    if current.is_empty() && !candidate.is_empty() {
        *current = candidate;
    }
}

fn merge_metadata(current: &mut LabMetadata, candidate: LabMetadata) {
    fill_blank(&mut current.collection_date, candidate.collection_date);
    fill_blank(&mut current.lab_name, candidate.lab_name);
}

fn fill_blank(slot: &mut Option<String>, candidate: Option<String>) {
    let is_blank = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    let candidate = candidate.filter(|c| !c.trim().is_empty());
    if is_blank && candidate.is_some() {
        *slot = candidate;
    }
}
