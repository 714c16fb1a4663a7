//! Chat-completion backend
//!
//! Sends the persona instructions as the system message and the well
//! snapshot as the user message to an OpenAI-compatible endpoint, then
//! parses the JSON object it returns into an `AgentDiagnosis`.
//!
//! Models wrap JSON in code fences and vary field types more than the
//! contract allows, so parsing is lenient about shape and strict about
//! presence: a reply without the core fields is a `Malformed` failure,
//! never a guessed diagnosis. `blocking_flag` gets no leniency at all: it
//! must be a JSON boolean or the exact string `"true"`/`"false"`.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::agents::{AgentPersona, CapabilityFailure, DiagnosisProducer};
use crate::config::DiagnosisConfig;
use crate::types::{AgentDiagnosis, Severity, WellAttributes};

/// Output contract appended to every persona's instructions.
const OUTPUT_CONTRACT: &str = r#"Respond with a single JSON object and nothing else:
{"well_id": string, "agent_name": string, "issue_detected": string, "recommendation": string,
 "severity": "High" | "Medium" | "Low", "blocking_flag": boolean, "confidence_score": number between 0 and 1}"#;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Diagnosis as models actually emit it.
#[derive(Debug, Deserialize)]
struct RawDiagnosis {
    #[serde(default)]
    well_id: Option<String>,
    #[serde(default)]
    agent_name: Option<String>,
    issue_detected: String,
    recommendation: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    blocking_flag: Value,
    #[serde(default)]
    confidence_score: Value,
}

// ============================================================================
// Backend
// ============================================================================

/// OpenAI-compatible chat completions backend
pub struct ChatCompletionBackend {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f64,
    api_key: Option<String>,
}

impl ChatCompletionBackend {
    /// Build from `[diagnosis]`. The API key is read from the configured
    /// environment variable; a missing key only fails at call time.
    pub fn from_config(config: &DiagnosisConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(config, api_key)
    }

    pub fn new(config: &DiagnosisConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("petroagent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    fn build_request<'a>(
        &'a self,
        persona: &AgentPersona,
        well_id: &str,
        attributes: &WellAttributes,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You are the {}. {}\n\n{OUTPUT_CONTRACT}",
                        persona.name, persona.instructions
                    ),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Here is the data context: Well: {well_id}, Data: {}",
                        attributes.to_context_string()
                    ),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        }
    }
}

#[async_trait]
impl DiagnosisProducer for ChatCompletionBackend {
    async fn assess(
        &self,
        persona: &AgentPersona,
        well_id: &str,
        attributes: &WellAttributes,
    ) -> Result<AgentDiagnosis, CapabilityFailure> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CapabilityFailure::Unavailable("no API key configured for chat backend".to_string())
        })?;

        let request = self.build_request(persona, well_id, attributes);
        debug!(well_id, agent = %persona.name, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityFailure::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityFailure::Rejected(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CapabilityFailure::Malformed(format!("response body: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CapabilityFailure::Malformed("no message content".to_string()))?;

        parse_diagnosis(&content, persona)
    }

    fn backend_name(&self) -> &'static str {
        "chat"
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn fence_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").ok())
        .as_ref()
}

/// Pull the JSON object out of a model reply.
fn extract_json(content: &str) -> Option<&str> {
    if let Some(caps) = fence_regex().and_then(|re| re.captures(content)) {
        if let Some(m) = caps.get(1) {
            return Some(m.as_str());
        }
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn parse_diagnosis(content: &str, persona: &AgentPersona) -> Result<AgentDiagnosis, CapabilityFailure> {
    let json = extract_json(content)
        .ok_or_else(|| CapabilityFailure::Malformed("reply contains no JSON object".to_string()))?;
    let raw: RawDiagnosis = serde_json::from_str(json)
        .map_err(|e| CapabilityFailure::Malformed(format!("diagnosis fields: {e}")))?;

    // Never default to "not blocking".
    let blocking_flag = match &raw.blocking_flag {
        Value::Bool(b) => *b,
        Value::String(s) if s == "true" => true,
        Value::String(s) if s == "false" => false,
        Value::Null => {
            return Err(CapabilityFailure::Malformed(
                "blocking_flag is missing".to_string(),
            ))
        }
        other => {
            return Err(CapabilityFailure::Malformed(format!(
                "blocking_flag is not a boolean: {other}"
            )))
        }
    };
    let confidence_score = match &raw.confidence_score {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };

    Ok(AgentDiagnosis {
        well_id: raw.well_id.filter(|w| !w.trim().is_empty()),
        agent_name: raw
            .agent_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| persona.name.clone()),
        issue_detected: raw.issue_detected,
        recommendation: raw.recommendation,
        severity: raw
            .severity
            .as_deref()
            .map_or(Severity::Unknown, Severity::parse_lenient),
        blocking_flag,
        confidence_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_json() {
        let reply = r#"{"well_id": "B2", "agent_name": "Integrity Agent",
            "issue_detected": "Casing collapse at 2100 m", "recommendation": "DO NOT INTERVENE",
            "severity": "High", "blocking_flag": true, "confidence_score": 0.97}"#;
        let d = parse_diagnosis(reply, &AgentPersona::integrity()).unwrap();
        assert!(d.blocking_flag);
        assert_eq!(d.severity, Severity::High);
        assert_eq!(d.well_id.as_deref(), Some("B2"));
    }

    #[test]
    fn test_parses_fenced_and_lenient_fields() {
        let reply = "Here you go:\n```json\n{\"issue_detected\": \"Scale\", \
            \"recommendation\": \"Recommend acid job\", \"severity\": \"medium\", \
            \"blocking_flag\": \"false\", \"confidence_score\": \"85%\"}\n```";
        let d = parse_diagnosis(reply, &AgentPersona::production()).unwrap();
        assert_eq!(d.agent_name, "Production Agent");
        assert_eq!(d.severity, Severity::Medium);
        assert!(!d.blocking_flag);
        assert!((d.confidence_score - 85.0).abs() < 1e-9);
        assert!(d.well_id.is_none());
    }

    #[test]
    fn test_missing_core_fields_is_malformed() {
        let err = parse_diagnosis(r#"{"severity": "High"}"#, &AgentPersona::integrity()).unwrap_err();
        assert!(matches!(err, CapabilityFailure::Malformed(_)));

        let err = parse_diagnosis("I cannot help with that.", &AgentPersona::integrity()).unwrap_err();
        assert!(matches!(err, CapabilityFailure::Malformed(_)));
    }

    #[test]
    fn test_blocking_flag_must_be_an_exact_boolean() {
        let reply = |flag: &str| {
            format!(
                r#"{{"issue_detected": "Casing collapse", "recommendation": "DO NOT INTERVENE",
                    "severity": "High"{flag}}}"#
            )
        };
        let persona = AgentPersona::integrity();

        let d = parse_diagnosis(&reply(r#", "blocking_flag": "true""#), &persona).unwrap();
        assert!(d.blocking_flag);

        for bad in [
            "",
            r#", "blocking_flag": null"#,
            r#", "blocking_flag": "yes""#,
            r#", "blocking_flag": "True.""#,
            r#", "blocking_flag": "TRUE""#,
            r#", "blocking_flag": 1"#,
            r#", "blocking_flag": 0"#,
        ] {
            let err = parse_diagnosis(&reply(bad), &persona).unwrap_err();
            assert!(matches!(err, CapabilityFailure::Malformed(_)), "{bad}");
        }
    }

    #[test]
    fn test_request_carries_persona_and_well() {
        let backend = ChatCompletionBackend::new(&DiagnosisConfig::default(), None).unwrap();
        let request = backend.build_request(&AgentPersona::integrity(), "B2", &WellAttributes::default());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        let system = json["messages"][0]["content"].as_str().unwrap();
        assert!(system.starts_with("You are the Integrity Agent."));
        let user = json["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("Well: B2"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let backend = ChatCompletionBackend::new(&DiagnosisConfig::default(), None).unwrap();
        let err = backend
            .assess(&AgentPersona::production(), "A1", &WellAttributes::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityFailure::Unavailable(_)));
    }
}
