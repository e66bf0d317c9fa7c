use std::sync::Arc;

use crate::pipeline::LabReportProcessor;

/// Shared state for all API routes.
#[derive(Clone)]
pub struct AppContext {
    pub processor: Arc<LabReportProcessor>,
}

impl AppContext {
    pub fn new(processor: LabReportProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }
}
