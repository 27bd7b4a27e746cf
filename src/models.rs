//! Wire types for prediction results.
//!
//! The upstream model's JSON answer is decoded straight into these types, so
//! a response with a wrong shape (unknown tag, missing field, non-integer
//! percentage) fails to decode and the engine falls back instead of
//! half-accepting it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three allowed scenario tags. Serialized in lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Optimistic,
    Realistic,
    Pessimistic,
}

impl ScenarioKind {
    /// All tags, in presentation order.
    pub const ALL: [ScenarioKind; 3] = [
        ScenarioKind::Optimistic,
        ScenarioKind::Realistic,
        ScenarioKind::Pessimistic,
    ];
}

/// One narrative outcome for a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionScenario {
    pub title: String,
    pub scenario: ScenarioKind,
    pub description: String,
    /// Likelihood as an integer percentage, 0-100.
    pub probability: u8,
    /// Model confidence as an integer percentage, 0-100.
    pub confidence: u8,
    /// Free-text duration phrase, e.g. "6-12 maanden".
    pub timeline: String,
    pub key_factors: Vec<String>,
    pub action_steps: Vec<String>,
}

/// The complete answer for one question: exactly three scenarios, one per
/// tag. Built fresh per request and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub question: String,
    pub scenarios: Vec<PredictionScenario>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_kind_uses_lowercase_tags() {
        assert_eq!(
            serde_json::to_string(&ScenarioKind::Optimistic).unwrap(),
            "\"optimistic\""
        );
        let parsed: ScenarioKind = serde_json::from_str("\"pessimistic\"").unwrap();
        assert_eq!(parsed, ScenarioKind::Pessimistic);
    }

    #[test]
    fn unknown_tag_fails_to_decode() {
        assert!(serde_json::from_str::<ScenarioKind>("\"neutral\"").is_err());
    }

    #[test]
    fn scenario_uses_camel_case_field_names() {
        let scenario = PredictionScenario {
            title: "Titel".into(),
            scenario: ScenarioKind::Realistic,
            description: "Beschrijving".into(),
            probability: 50,
            confidence: 85,
            timeline: "6-12 maanden".into(),
            key_factors: vec!["Factor".into()],
            action_steps: vec!["Stap".into()],
        };
        let json = serde_json::to_value(&scenario).unwrap();
        assert!(json.get("keyFactors").is_some());
        assert!(json.get("actionSteps").is_some());
        assert!(json.get("key_factors").is_none());
    }

    #[test]
    fn fractional_probability_fails_to_decode() {
        let json = r#"{
            "title": "t", "scenario": "optimistic", "description": "d",
            "probability": 30.5, "confidence": 70, "timeline": "kort",
            "keyFactors": [], "actionSteps": []
        }"#;
        assert!(serde_json::from_str::<PredictionScenario>(json).is_err());
    }
}
