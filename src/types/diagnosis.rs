//! Diagnostic agent output
//!
//! One `AgentDiagnosis` is produced per diagnostic pass (production or
//! integrity), consumed by the arbitrator and then discarded.

use serde::{Deserialize, Serialize};

/// Severity reported by a diagnostic agent.
///
/// Backends are not strictly validated: anything outside High/Medium/Low
/// deserialises to `Unknown` instead of failing the whole diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

impl Severity {
    /// Lenient parse used for free-text backend output.
    pub fn parse_lenient(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("high") || lower.starts_with("critical") {
            Self::High
        } else if lower.starts_with("med") {
            Self::Medium
        } else if lower.starts_with("low") {
            Self::Low
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Phrases that mark a recommendation as "do nothing".
///
/// Anything else in a production recommendation counts as a request to
/// intervene.
const NON_INTERVENTION_MARKERS: &[&str] = &[
    "no action",
    "no intervention",
    "do not intervene",
    "not recommended",
    "no workover",
    "none required",
    "monitor only",
];

/// Structured output of one diagnostic pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDiagnosis {
    /// Filled in by the caller when the backend leaves it empty
    #[serde(default)]
    pub well_id: Option<String>,
    pub agent_name: String,
    pub issue_detected: String,
    pub recommendation: String,
    pub severity: Severity,
    /// Veto switch. Only meaningful for the integrity persona; callers
    /// must not assume the production persona leaves it false.
    pub blocking_flag: bool,
    /// Advisory metadata, normalised to 0..=1. Never used for decisions.
    pub confidence_score: f64,
}

impl AgentDiagnosis {
    /// Whether the recommendation text asks for an intervention.
    pub fn recommends_intervention(&self) -> bool {
        let text = self.recommendation.to_lowercase();
        if text.trim().is_empty() {
            return false;
        }
        !NON_INTERVENTION_MARKERS.iter().any(|m| text.contains(m))
    }

    /// Normalise confidence in place and return self.
    pub fn with_normalized_confidence(mut self) -> Self {
        self.confidence_score = normalize_confidence(self.confidence_score);
        self
    }
}

/// Map an unconstrained confidence to 0..=1.
///
/// Values in (1, 100] are read as percentages. Non-finite values become 0.
pub fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let scaled = if raw > 1.0 && raw <= 100.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnosis(recommendation: &str) -> AgentDiagnosis {
        AgentDiagnosis {
            well_id: Some("A1".to_string()),
            agent_name: "Production Agent".to_string(),
            issue_detected: "Production gap".to_string(),
            recommendation: recommendation.to_string(),
            severity: Severity::Medium,
            blocking_flag: false,
            confidence_score: 0.9,
        }
    }

    #[test]
    fn test_recommends_intervention() {
        assert!(diagnosis("Recommend acid stimulation").recommends_intervention());
        assert!(!diagnosis("No action needed").recommends_intervention());
        assert!(!diagnosis("Intervention NOT RECOMMENDED").recommends_intervention());
        assert!(!diagnosis("   ").recommends_intervention());
    }

    #[test]
    fn test_normalize_confidence() {
        assert!((normalize_confidence(0.8) - 0.8).abs() < 1e-12);
        assert!((normalize_confidence(85.0) - 0.85).abs() < 1e-12);
        assert_eq!(normalize_confidence(250.0), 1.0);
        assert_eq!(normalize_confidence(-3.0), 0.0);
        assert_eq!(normalize_confidence(f64::NAN), 0.0);
    }

    #[test]
    fn test_unknown_severity_deserialises() {
        let json = r#"{
            "agent_name": "Integrity Agent",
            "issue_detected": "x",
            "recommendation": "y",
            "severity": "Catastrophic",
            "blocking_flag": true,
            "confidence_score": 1.0
        }"#;
        let parsed: AgentDiagnosis = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.severity, Severity::Unknown);
        assert_eq!(parsed.well_id, None);
    }

    #[test]
    fn test_severity_parse_lenient() {
        assert_eq!(Severity::parse_lenient(" HIGH "), Severity::High);
        assert_eq!(Severity::parse_lenient("medium"), Severity::Medium);
        assert_eq!(Severity::parse_lenient("Low risk"), Severity::Low);
        assert_eq!(Severity::parse_lenient("?"), Severity::Unknown);
    }
}
