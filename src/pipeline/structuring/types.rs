use super::StructuringError;

/// Sampling and output-format knobs for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Ask the backend to constrain output to a JSON object.
    pub json_mode: bool,
    /// Cap on generated tokens. `None` = backend default.
    pub num_predict: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            json_mode: true,
            num_predict: None,
        }
    }
}

impl GenerationOptions {
    pub fn json(temperature: f32) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }
}

/// LLM client abstraction (allows mocking).
///
/// Calls are blocking; async callers run them on the blocking pool.
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        options: &GenerationOptions,
    ) -> Result<String, StructuringError>;

    fn list_models(&self) -> Result<Vec<String>, StructuringError>;

    fn is_model_available(&self, model: &str) -> Result<bool, StructuringError> {
        Ok(self.list_models()?.iter().any(|m| m.starts_with(model)))
    }
}
