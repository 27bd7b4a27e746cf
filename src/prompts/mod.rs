//! Prompt template for scenario generation.
//!
//! Uses the Handlebars templating engine with a single built-in template.
//! The template embeds the sanitized question verbatim (triple-stache, so
//! Handlebars does not HTML-escape quotes) and pins down the exact JSON
//! shape the model must answer with: a single object holding a `scenarios`
//! array of exactly three tagged entries and no surrounding prose.

use handlebars::Handlebars;
use serde_json::json;

use crate::error::{Result, ServiceError};

const PREDICTION_TEMPLATE_NAME: &str = "prediction";

const PREDICTION_TEMPLATE: &str = r#"Analyseer deze vraag en genereer 3 toekomstscenario's:

"{{{question}}}"

Geef exact 3 scenario's:
1. OPTIMISTISCH (beste uitkomst)
2. REALISTISCH (waarschijnlijke uitkomst)
3. PESSIMISTISCH (moeilijke uitkomst)

Geef per scenario een titel, beschrijving, waarschijnlijkheid, vertrouwen, tijdlijn, 3-5 sleutelfactoren en 3-5 actiestappen.

Antwoord met ALLEEN deze JSON structuur:
{
  "scenarios": [
    {
      "title": "Korte titel",
      "scenario": "optimistic",
      "description": "Uitgebreide beschrijving van dit scenario",
      "probability": 30,
      "confidence": 75,
      "timeline": "6-12 maanden",
      "keyFactors": ["Factor 1", "Factor 2", "Factor 3"],
      "actionSteps": ["Stap 1", "Stap 2", "Stap 3"]
    }
  ]
}"#;

/// Renders the generation prompt for a question.
pub struct PromptManager {
    handlebars: Handlebars<'static>,
}

impl PromptManager {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string(PREDICTION_TEMPLATE_NAME, PREDICTION_TEMPLATE)
            .map_err(|e| ServiceError::Config(format!("invalid prompt template: {e}")))?;
        Ok(Self { handlebars })
    }

    /// Render the prediction prompt with the sanitized question embedded.
    pub fn render_prediction(&self, question: &str) -> Result<String> {
        self.handlebars
            .render(PREDICTION_TEMPLATE_NAME, &json!({ "question": question }))
            .map_err(|e| ServiceError::Config(format!("prompt rendering failed: {e}")))
    }
}
