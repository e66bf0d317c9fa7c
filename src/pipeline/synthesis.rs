use std::sync::Arc;

use tokio::time::Instant;

use super::structuring::{
    build_synthesis_prompt, parse_synthesis_response, GenerationOptions, LlmClient,
    SynthesisOutput, SYNTHESIS_SYSTEM_PROMPT,
};
use crate::models::AnalysisInput;

/// Used when the model omits a disclaimer, and in the stub narrative.
pub const DEFAULT_DISCLAIMER: &str = "Esta interpretación es solo informativa y no reemplaza \
    la evaluación de un profesional de la salud.";

/// Summary used when synthesis fails.
pub const STUB_SUMMARY: &str = "No fue posible generar el resumen automático. Los resultados \
    estructurados del informe están disponibles para su revisión.";

const SYNTHESIS_TEMPERATURE: f32 = 0.1;

/// Narrative half of an interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub summary: String,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub disclaimer: String,
    /// True when this is the stub.
    pub degraded: bool,
}

impl Narrative {
    pub fn stub() -> Self {
        Self {
            summary: STUB_SUMMARY.to_string(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
            degraded: true,
        }
    }
}

impl From<SynthesisOutput> for Narrative {
    fn from(output: SynthesisOutput) -> Self {
        let disclaimer = output
            .disclaimer
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DISCLAIMER.to_string());
        Self {
            summary: output.summary.trim().to_string(),
            warnings: output.warnings,
            recommendations: output.recommendations,
            disclaimer,
            degraded: false,
        }
    }
}

/// One synthesis call over the merged results. Never fails: any error,
/// including the deadline, yields the stub narrative.
pub struct SynthesisStage {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl SynthesisStage {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str) -> Self {
        Self {
            llm,
            model: model.to_string(),
        }
    }

    pub async fn synthesize(&self, input: &AnalysisInput, deadline: Instant) -> Narrative {
        let prompt = build_synthesis_prompt(input);
        let llm = self.llm.clone();
        let model = self.model.clone();

        let call = tokio::task::spawn_blocking(move || {
            let options = GenerationOptions::json(SYNTHESIS_TEMPERATURE);
            llm.generate(&model, &prompt, SYNTHESIS_SYSTEM_PROMPT, &options)
                .and_then(|response| parse_synthesis_response(&response))
        });

        match tokio::time::timeout_at(deadline, call).await {
            Ok(Ok(Ok(output))) => Narrative::from(output),
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, "Synthesis failed, using stub narrative");
                Narrative::stub()
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Synthesis task aborted, using stub narrative");
                Narrative::stub()
            }
            Err(_) => {
                tracing::warn!("Synthesis deadline reached, using stub narrative");
                Narrative::stub()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::structuring::MockLlmClient;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[tokio::test]
    async fn successful_synthesis() {
        let llm = Arc::new(MockLlmClient::new(
            r#"{"summary": "Todo normal.", "warnings": [], "recommendations": ["Control anual"]}"#,
        ));
        let stage = SynthesisStage::new(llm.clone(), "m");
        let narrative = stage.synthesize(&AnalysisInput::default(), deadline()).await;

        assert!(!narrative.degraded);
        assert_eq!(narrative.summary, "Todo normal.");
        assert_eq!(narrative.recommendations, vec!["Control anual".to_string()]);
        assert_eq!(narrative.disclaimer, DEFAULT_DISCLAIMER);
        assert_eq!(llm.calls()[0].system, SYNTHESIS_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn bad_json_degrades_to_stub() {
        let stage = SynthesisStage::new(Arc::new(MockLlmClient::new("lo siento")), "m");
        let narrative = stage.synthesize(&AnalysisInput::default(), deadline()).await;
        assert_eq!(narrative, Narrative::stub());
    }

    #[tokio::test]
    async fn call_error_degrades_to_stub() {
        let stage = SynthesisStage::new(Arc::new(MockLlmClient::failing("down")), "m");
        let narrative = stage.synthesize(&AnalysisInput::default(), deadline()).await;
        assert!(narrative.degraded);
        assert!(narrative.warnings.is_empty());
        assert!(narrative.recommendations.is_empty());
    }

    #[tokio::test]
    async fn deadline_degrades_to_stub() {
        let llm = MockLlmClient::new(r#"{"summary": "tarde"}"#).with_delay(Duration::from_millis(300));
        let stage = SynthesisStage::new(Arc::new(llm), "m");
        let narrative = stage
            .synthesize(&AnalysisInput::default(), Instant::now() + Duration::from_millis(20))
            .await;
        assert!(narrative.degraded);
    }
}
