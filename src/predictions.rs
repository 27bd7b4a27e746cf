//! Prediction generation.
//!
//! [`PredictionEngine`] owns the upstream model client and turns a sanitized
//! question into a [`PredictionResult`]. Its central property is that
//! ordinary failure never reaches the caller: a malformed or misshapen model
//! answer, a parse error, or an unclassified transport failure all degrade
//! to the fixed fallback scenarios, so the end user always gets some
//! three-scenario answer. Only two error kinds escape, because the HTTP
//! layer must map them to distinct statuses: missing/rejected credentials
//! and an upstream rate-limit rejection.

use chrono::Utc;
use log::{info, warn};

use crate::ai::{self, AiClient, RequestOptions};
use crate::config::{Config, CredentialMode};
use crate::error::{Result, ServiceError};
use crate::models::{PredictionResult, PredictionScenario, ScenarioKind};
use crate::prompts::PromptManager;

/// Generates three future scenarios for a question.
pub struct PredictionEngine {
    client: Option<Box<dyn AiClient>>,
    prompts: PromptManager,
    options: RequestOptions,
    credential_mode: CredentialMode,
}

impl PredictionEngine {
    /// Build the engine from configuration. A missing API key is not a boot
    /// failure: the engine starts without a client and the configured
    /// [`CredentialMode`] decides per request whether that surfaces as a
    /// credential error or as fallback scenarios.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = if config.has_api_key() {
            Some(ai::build_client(config)?)
        } else {
            warn!("no Anthropic API key configured, credential mode is {:?}", config.credential_mode);
            None
        };
        Ok(Self {
            client,
            prompts: PromptManager::new()?,
            options: RequestOptions::from_config(config),
            credential_mode: config.credential_mode,
        })
    }

    /// Build the engine around an existing client. Used by tests to inject
    /// a stub model.
    pub fn with_client(client: Box<dyn AiClient>, config: &Config) -> Result<Self> {
        Ok(Self {
            client: Some(client),
            prompts: PromptManager::new()?,
            options: RequestOptions::from_config(config),
            credential_mode: config.credential_mode,
        })
    }

    /// Generate a prediction for a sanitized question.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Credentials`] when no key is configured in
    /// strict mode or the upstream rejects the key, and
    /// [`ServiceError::UpstreamRateLimit`] when the model provider is rate
    /// limiting us. Every other failure mode yields `Ok` with the fallback
    /// result.
    pub async fn generate(&self, question: &str) -> Result<PredictionResult> {
        let client = match &self.client {
            Some(client) => client,
            None => {
                return match self.credential_mode {
                    CredentialMode::Strict => Err(ServiceError::Credentials(
                        "Anthropic API key is not configured".to_string(),
                    )),
                    CredentialMode::Fallback => {
                        warn!("no API key configured, serving fallback scenarios");
                        Ok(fallback_result(question))
                    }
                };
            }
        };

        let prompt = self.prompts.render_prediction(question)?;

        let raw = match client.generate(&prompt, &self.options).await {
            Ok(raw) => raw,
            Err(err @ ServiceError::Credentials(_)) => return Err(err),
            Err(err @ ServiceError::UpstreamRateLimit(_)) => return Err(err),
            Err(err) => {
                warn!("model call failed ({err}), serving fallback scenarios");
                return Ok(fallback_result(question));
            }
        };

        match parse_scenarios(&raw) {
            Ok(scenarios) => {
                info!("generated {} scenarios for question", scenarios.len());
                Ok(PredictionResult {
                    question: question.to_string(),
                    scenarios,
                    generated_at: Utc::now(),
                })
            }
            Err(err) => {
                warn!("invalid model response ({err}), serving fallback scenarios");
                Ok(fallback_result(question))
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct ScenariosPayload {
    scenarios: Vec<PredictionScenario>,
}

/// Remove Markdown code-fence wrapping the model tends to add around JSON.
fn strip_code_fences(raw: &str) -> String {
    raw.trim().replace("```json", "").replace("```", "").trim().to_string()
}

/// Decode and validate the model's answer: exactly three scenarios, one per
/// tag. Tag uniqueness is enforced, not just cardinality, so a response with
/// two `optimistic` entries is rejected.
fn parse_scenarios(raw: &str) -> Result<Vec<PredictionScenario>> {
    let cleaned = strip_code_fences(raw);
    let payload: ScenariosPayload = serde_json::from_str(&cleaned)?;

    if payload.scenarios.len() != 3 {
        return Err(ServiceError::Parse(format!(
            "expected 3 scenarios, got {}",
            payload.scenarios.len()
        )));
    }

    for kind in ScenarioKind::ALL {
        let count = payload
            .scenarios
            .iter()
            .filter(|s| s.scenario == kind)
            .count();
        if count != 1 {
            return Err(ServiceError::Parse(format!(
                "expected exactly one {kind:?} scenario, got {count}"
            )));
        }
    }

    Ok(payload.scenarios)
}

/// The fixed result served whenever live generation cannot produce a valid
/// answer. Deterministic apart from the generation timestamp.
pub fn fallback_result(question: &str) -> PredictionResult {
    PredictionResult {
        question: question.to_string(),
        scenarios: vec![
            PredictionScenario {
                title: "Optimistische uitkomst".to_string(),
                scenario: ScenarioKind::Optimistic,
                description: "In dit scenario verloopt alles volgens plan en bereik je je doelen sneller dan verwacht.".to_string(),
                probability: 25,
                confidence: 70,
                timeline: "3-6 maanden".to_string(),
                key_factors: vec![
                    "Gunstige omstandigheden".to_string(),
                    "Goede timing".to_string(),
                    "Sterke motivatie".to_string(),
                ],
                action_steps: vec![
                    "Focus op je sterke punten".to_string(),
                    "Neem initiatief".to_string(),
                    "Blijf positief".to_string(),
                ],
            },
            PredictionScenario {
                title: "Realistische uitkomst".to_string(),
                scenario: ScenarioKind::Realistic,
                description: "Dit is het meest waarschijnlijke scenario met normale ups en downs onderweg naar je doel.".to_string(),
                probability: 50,
                confidence: 85,
                timeline: "6-12 maanden".to_string(),
                key_factors: vec![
                    "Normale marktomstandigheden".to_string(),
                    "Gemiddelde vooruitgang".to_string(),
                    "Standaard uitdagingen".to_string(),
                ],
                action_steps: vec![
                    "Maak een concrete planning".to_string(),
                    "Blijf consistent".to_string(),
                    "Zoek ondersteuning".to_string(),
                ],
            },
            PredictionScenario {
                title: "Uitdagende uitkomst".to_string(),
                scenario: ScenarioKind::Pessimistic,
                description: "In dit scenario kom je meer obstakels tegen dan verwacht, maar met doorzettingsvermogen kun je alsnog slagen.".to_string(),
                probability: 25,
                confidence: 75,
                timeline: "12-18 maanden".to_string(),
                key_factors: vec![
                    "Onvoorziene obstakels".to_string(),
                    "Langere leercurve".to_string(),
                    "Extra geduld vereist".to_string(),
                ],
                action_steps: vec![
                    "Bereid je voor op uitdagingen".to_string(),
                    "Zoek alternatieven".to_string(),
                    "Houd vol".to_string(),
                ],
            },
        ],
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiClient;
    use serde_json::json;

    fn valid_scenarios_json() -> String {
        json!({
            "scenarios": [
                {
                    "title": "Alles lukt", "scenario": "optimistic",
                    "description": "Het gaat beter dan verwacht.",
                    "probability": 30, "confidence": 75, "timeline": "3-6 maanden",
                    "keyFactors": ["Timing", "Inzet", "Netwerk"],
                    "actionSteps": ["Begin vandaag", "Zoek hulp", "Houd vol"]
                },
                {
                    "title": "Gestage groei", "scenario": "realistic",
                    "description": "Normale vooruitgang met wat tegenslag.",
                    "probability": 50, "confidence": 85, "timeline": "6-12 maanden",
                    "keyFactors": ["Planning", "Consistentie", "Geduld"],
                    "actionSteps": ["Maak een plan", "Evalueer maandelijks", "Stel bij"]
                },
                {
                    "title": "Zware weg", "scenario": "pessimistic",
                    "description": "Meer obstakels dan gehoopt.",
                    "probability": 20, "confidence": 70, "timeline": "12-18 maanden",
                    "keyFactors": ["Tegenwind", "Concurrentie", "Kosten"],
                    "actionSteps": ["Bouw reserves op", "Zoek alternatieven", "Blijf leren"]
                }
            ]
        })
        .to_string()
    }

    fn test_config(mode: CredentialMode) -> Config {
        Config {
            credential_mode: mode,
            ..Config::default()
        }
    }

    fn engine_with(client: MockAiClient) -> PredictionEngine {
        PredictionEngine::with_client(
            Box::new(client),
            &test_config(CredentialMode::Strict),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_model_answer_is_returned() {
        let mut client = MockAiClient::new();
        let answer = valid_scenarios_json();
        client
            .expect_generate()
            .returning(move |_, _| Ok(answer.clone()));

        let result = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap();

        assert_eq!(result.scenarios.len(), 3);
        assert_eq!(result.question, "Zal ik dit jaar een nieuwe baan vinden?");
        let tags: std::collections::HashSet<_> =
            result.scenarios.iter().map(|s| s.scenario).collect();
        assert_eq!(tags.len(), 3);
        // Not the fallback text
        assert_eq!(result.scenarios[0].title, "Alles lukt");
    }

    #[tokio::test]
    async fn fenced_answer_is_unwrapped() {
        let mut client = MockAiClient::new();
        let answer = format!("```json\n{}\n```", valid_scenarios_json());
        client
            .expect_generate()
            .returning(move |_, _| Ok(answer.clone()));

        let result = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap();
        assert_eq!(result.scenarios[0].title, "Alles lukt");
    }

    #[tokio::test]
    async fn garbage_answer_falls_back() {
        let mut client = MockAiClient::new();
        client
            .expect_generate()
            .returning(|_, _| Ok("Sorry, ik kan geen JSON maken.".to_string()));

        let result = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap();
        assert_eq!(result.scenarios[0].title, "Optimistische uitkomst");
    }

    #[tokio::test]
    async fn wrong_cardinality_falls_back() {
        let mut client = MockAiClient::new();
        client.expect_generate().returning(|_, _| {
            Ok(json!({ "scenarios": [] }).to_string())
        });

        let result = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap();
        assert_eq!(result.scenarios[0].title, "Optimistische uitkomst");
    }

    #[tokio::test]
    async fn duplicate_tags_fall_back() {
        // Three entries, but two of them optimistic.
        let duplicated = valid_scenarios_json().replace("\"realistic\"", "\"optimistic\"");
        let mut client = MockAiClient::new();
        client
            .expect_generate()
            .returning(move |_, _| Ok(duplicated.clone()));

        let result = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap();
        assert_eq!(result.scenarios[0].title, "Optimistische uitkomst");
    }

    #[tokio::test]
    async fn transport_failure_falls_back() {
        let mut client = MockAiClient::new();
        client
            .expect_generate()
            .returning(|_, _| Err(ServiceError::Network("connection refused".into())));

        let result = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap();
        assert_eq!(result.scenarios[0].title, "Optimistische uitkomst");
    }

    #[tokio::test]
    async fn credential_rejection_is_re_raised() {
        let mut client = MockAiClient::new();
        client
            .expect_generate()
            .returning(|_, _| Err(ServiceError::Credentials("rejected".into())));

        let err = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Credentials(_)));
    }

    #[tokio::test]
    async fn upstream_rate_limit_is_re_raised() {
        let mut client = MockAiClient::new();
        client
            .expect_generate()
            .returning(|_, _| Err(ServiceError::UpstreamRateLimit("limited".into())));

        let err = engine_with(client)
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamRateLimit(_)));
    }

    #[tokio::test]
    async fn missing_key_strict_is_a_credential_error() {
        let engine =
            PredictionEngine::from_config(&test_config(CredentialMode::Strict)).unwrap();
        let err = engine
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Credentials(_)));
    }

    #[tokio::test]
    async fn missing_key_fallback_mode_serves_fallback() {
        let engine =
            PredictionEngine::from_config(&test_config(CredentialMode::Fallback)).unwrap();
        let result = engine
            .generate("Zal ik dit jaar een nieuwe baan vinden?")
            .await
            .unwrap();
        assert_eq!(result.scenarios.len(), 3);
        assert_eq!(result.scenarios[0].title, "Optimistische uitkomst");
    }

    #[test]
    fn fallback_is_deterministic() {
        let a = fallback_result("Komt alles goed met mij?");
        let b = fallback_result("Komt alles goed met mij?");
        for (x, y) in a.scenarios.iter().zip(b.scenarios.iter()) {
            assert_eq!(x.title, y.title);
            assert_eq!(x.probability, y.probability);
            assert_eq!(x.confidence, y.confidence);
            assert_eq!(x.timeline, y.timeline);
        }
        let probabilities: Vec<u8> = a.scenarios.iter().map(|s| s.probability).collect();
        assert_eq!(probabilities, vec![25, 50, 25]);
        let tags: std::collections::HashSet<_> = a.scenarios.iter().map(|s| s.scenario).collect();
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn fence_stripping_handles_plain_and_fenced_input() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
