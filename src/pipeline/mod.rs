pub mod chunked;
pub mod collaborators;
pub mod extraction;
pub mod processor;
pub mod structuring;
pub mod synthesis;

pub use collaborators::{CollaboratorError, HistorySink, ProfileLookup};
pub use processor::{InterpretRequest, LabReportProcessor, PipelineConfig};
pub use synthesis::{Narrative, SynthesisStage};

use thiserror::Error;

/// Terminal pipeline failures. Everything else (skipped rows, failed
/// chunks, failed synthesis, failed persistence) degrades instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No OCR text to process")]
    EmptyInput,

    #[error("Extraction failed for all {chunks} chunks")]
    TotalExtractionFailure { chunks: usize },

    #[error("Extraction did not finish within {secs}s")]
    DeadlineExceeded { secs: u64 },
}
