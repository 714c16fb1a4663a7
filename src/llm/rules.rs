//! Rule Engine Backend - deterministic diagnosis without a model
//!
//! Implements both persona behaviour contracts with the thresholds from
//! `[production]` and `[integrity]`. Same input, same diagnosis, every
//! time, which makes it the default backend and the one tests run against.

use async_trait::async_trait;

use crate::agents::{AgentPersona, CapabilityFailure, DiagnosisProducer, PersonaRole};
use crate::config::{IntegrityConfig, ProductionConfig};
use crate::types::{AgentDiagnosis, Severity, WellAttributes};

/// Free-text fields the production persona may cite as a cause.
const PRODUCTION_HINT_FIELDS: &[&str] = &[
    "suspected_issue",
    "production_notes",
    "reservoir_notes",
    "issue",
    "notes",
    "lift_type",
];

/// Substrings that put a field under integrity review.
const INTEGRITY_FIELD_MARKERS: &[&str] = &["mechanical", "casing", "integrity"];

/// Values that mean "nothing reported".
const CLEAN_VALUES: &[&str] = &["", "none", "n/a", "na", "nil", "-", "ok", "good", "intact", "no issues"];

pub const INTEGRITY_VETO_RECOMMENDATION: &str = "DO NOT INTERVENE - RIG WORKOVER REQUIRED";

/// Uplift at which the production gap itself is rated High.
const HIGH_UPLIFT: f64 = 0.5;

const RULE_HIT_CONFIDENCE: f64 = 0.95;
const DEFAULT_CONFIDENCE: f64 = 0.9;

/// Deterministic backend for both personas
#[derive(Debug, Clone, Default)]
pub struct RuleEngineBackend {
    production: ProductionConfig,
    integrity: IntegrityConfig,
}

impl RuleEngineBackend {
    pub fn new(production: ProductionConfig, integrity: IntegrityConfig) -> Self {
        Self {
            production,
            integrity,
        }
    }

    fn diagnose_production(
        &self,
        persona: &AgentPersona,
        well_id: &str,
        attrs: &WellAttributes,
    ) -> Result<AgentDiagnosis, CapabilityFailure> {
        let cfg = &self.production;
        let current = attrs
            .current_rate()
            .ok_or_else(|| CapabilityFailure::Malformed("well has no current rate".to_string()))?;
        let potential = attrs
            .potential_rate()
            .ok_or_else(|| CapabilityFailure::Malformed("well has no potential rate".to_string()))?;
        if current < 0.0 || potential < 0.0 {
            return Err(CapabilityFailure::Malformed(format!(
                "negative rate (current {current}, potential {potential})"
            )));
        }

        let uplift = if current > 0.0 {
            (potential - current) / current
        } else if potential > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let has_upside = uplift > cfg.uplift_margin;
        let water_cut = attrs.water_cut();
        let high_water_cut = water_cut.is_some_and(|wc| wc > cfg.high_water_cut);
        let recommend = has_upside && (!high_water_cut || uplift >= cfg.massive_upside_margin);

        let mut issue = if has_upside {
            format!(
                "Production gap of {} (current {current:.0} bopd vs potential {potential:.0} bopd)",
                format_uplift(uplift)
            )
        } else {
            format!("Well producing near potential ({current:.0} of {potential:.0} bopd)")
        };
        let hints: Vec<String> = PRODUCTION_HINT_FIELDS
            .iter()
            .filter_map(|k| attrs.text(k))
            .filter(|t| !is_clean(t))
            .collect();
        if !hints.is_empty() {
            issue.push_str(&format!(". Suspected cause: {}", hints.join("; ")));
        }
        if let Some(wc) = water_cut.filter(|_| high_water_cut) {
            issue.push_str(&format!(
                ". High Risk: water cut {:.0}% exceeds {:.0}%",
                wc * 100.0,
                cfg.high_water_cut * 100.0
            ));
        }

        let recommendation = if recommend && high_water_cut {
            format!(
                "Recommend workover intervention: {} upside justifies high water cut",
                format_uplift(uplift)
            )
        } else if recommend {
            format!(
                "Recommend workover intervention: potential exceeds current by {} (margin {:.0}%)",
                format_uplift(uplift),
                cfg.uplift_margin * 100.0
            )
        } else if has_upside {
            format!(
                "Intervention not recommended: water cut too high for {} upside",
                format_uplift(uplift)
            )
        } else {
            format!(
                "No action: potential within {:.0}% of current rate",
                cfg.uplift_margin * 100.0
            )
        };

        let severity = if high_water_cut || uplift >= HIGH_UPLIFT {
            Severity::High
        } else if has_upside {
            Severity::Medium
        } else {
            Severity::Low
        };

        Ok(AgentDiagnosis {
            well_id: Some(well_id.to_string()),
            agent_name: persona.name.clone(),
            issue_detected: issue,
            recommendation,
            severity,
            blocking_flag: false,
            confidence_score: if recommend { RULE_HIT_CONFIDENCE } else { DEFAULT_CONFIDENCE },
        })
    }

    fn diagnose_integrity(
        &self,
        persona: &AgentPersona,
        well_id: &str,
        attrs: &WellAttributes,
    ) -> AgentDiagnosis {
        let keywords: Vec<String> = self
            .integrity
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let mut reviewed = Vec::new();
        let mut findings = Vec::new();
        for (key, _) in attrs.iter() {
            let lower_key = key.to_lowercase();
            let in_scope = self.integrity.fields.iter().any(|f| f.eq_ignore_ascii_case(key))
                || INTEGRITY_FIELD_MARKERS.iter().any(|m| lower_key.contains(m));
            if !in_scope {
                continue;
            }
            let Some(text) = attrs.text(key).filter(|t| !is_clean(t)) else {
                continue;
            };
            let lower = text.to_lowercase();
            if keywords.iter().any(|k| lower.contains(k.as_str())) {
                findings.push(format!("{key}: {text}"));
            } else {
                reviewed.push(format!("{key}: {text}"));
            }
        }

        let (issue, recommendation, severity, blocking, confidence) = if !findings.is_empty() {
            (
                format!("Integrity threat: {}", findings.join("; ")),
                INTEGRITY_VETO_RECOMMENDATION.to_string(),
                Severity::High,
                true,
                RULE_HIT_CONFIDENCE,
            )
        } else if !reviewed.is_empty() {
            (
                format!("Mechanical notes reviewed, no blocking condition: {}", reviewed.join("; ")),
                "Cleared for intervention".to_string(),
                Severity::Medium,
                false,
                DEFAULT_CONFIDENCE,
            )
        } else {
            (
                "No mechanical integrity issues recorded".to_string(),
                "Cleared for intervention".to_string(),
                Severity::Low,
                false,
                DEFAULT_CONFIDENCE,
            )
        };

        AgentDiagnosis {
            well_id: Some(well_id.to_string()),
            agent_name: persona.name.clone(),
            issue_detected: issue,
            recommendation,
            severity,
            blocking_flag: blocking,
            confidence_score: confidence,
        }
    }
}

#[async_trait]
impl DiagnosisProducer for RuleEngineBackend {
    async fn assess(
        &self,
        persona: &AgentPersona,
        well_id: &str,
        attributes: &WellAttributes,
    ) -> Result<AgentDiagnosis, CapabilityFailure> {
        match persona.role {
            PersonaRole::Production => self.diagnose_production(persona, well_id, attributes),
            PersonaRole::Integrity => Ok(self.diagnose_integrity(persona, well_id, attributes)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "rules"
    }
}

fn is_clean(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    CLEAN_VALUES.contains(&t.as_str())
}

fn format_uplift(uplift: f64) -> String {
    if uplift.is_finite() {
        format!("{:.0}%", uplift * 100.0)
    } else {
        "unbounded".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn attrs(value: Value) -> WellAttributes {
        match value {
            Value::Object(map) => WellAttributes::new(map),
            _ => WellAttributes::default(),
        }
    }

    async fn production(value: Value) -> Result<AgentDiagnosis, CapabilityFailure> {
        RuleEngineBackend::default()
            .assess(&AgentPersona::production(), "W1", &attrs(value))
            .await
    }

    async fn integrity(value: Value) -> AgentDiagnosis {
        RuleEngineBackend::default()
            .assess(&AgentPersona::integrity(), "W1", &attrs(value))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_production_recommends_above_margin() {
        let d = production(json!({"current_rate": 100, "potential_rate": 130, "water_cut": 0.5}))
            .await
            .unwrap();
        assert!(d.recommends_intervention(), "{}", d.recommendation);
        assert!(!d.blocking_flag);
        assert_eq!(d.severity, Severity::Medium);
        assert_eq!(d.agent_name, "Production Agent");
    }

    #[tokio::test]
    async fn test_production_margin_is_exclusive() {
        let d = production(json!({"current_rate": 100, "potential_rate": 120}))
            .await
            .unwrap();
        assert!(!d.recommends_intervention(), "{}", d.recommendation);
        assert_eq!(d.severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_high_water_cut_needs_massive_upside() {
        let modest = production(json!({"current_rate": 100, "potential_rate": 150, "water_cut": "95%"}))
            .await
            .unwrap();
        assert!(!modest.recommends_intervention(), "{}", modest.recommendation);
        assert!(modest.issue_detected.contains("High Risk"));
        assert_eq!(modest.severity, Severity::High);

        let massive = production(json!({"current_rate": 100, "potential_rate": 250, "water_cut": 95}))
            .await
            .unwrap();
        assert!(massive.recommends_intervention(), "{}", massive.recommendation);
    }

    #[tokio::test]
    async fn test_production_ignores_mechanical_fields() {
        let d = production(json!({
            "current_rate": 100,
            "potential_rate": 200,
            "mechanical_issues": "Casing Collapse"
        }))
        .await
        .unwrap();
        assert!(!d.blocking_flag);
        assert!(!d.issue_detected.contains("Collapse"));
    }

    #[tokio::test]
    async fn test_production_carries_hints() {
        let d = production(json!({
            "last_test_oil": 100,
            "potential_oil": 180,
            "suspected_issue": "Scale buildup"
        }))
        .await
        .unwrap();
        assert!(d.issue_detected.contains("Suspected cause: Scale buildup"));
    }

    #[tokio::test]
    async fn test_production_zero_current_rate_is_unbounded() {
        let d = production(json!({"current_rate": 0, "potential_rate": 40}))
            .await
            .unwrap();
        assert!(d.recommends_intervention());
        assert!(d.issue_detected.contains("unbounded"));
    }

    #[tokio::test]
    async fn test_production_missing_rates_fail_explicitly() {
        let err = production(json!({"current_rate": 100})).await.unwrap_err();
        assert!(matches!(err, CapabilityFailure::Malformed(_)));
    }

    #[tokio::test]
    async fn test_integrity_keywords_block() {
        for text in ["Casing Collapse", "Tubing LEAK at 3000ft", "Sand ingress", "Severe corrosion", "Restricted ID"] {
            let d = integrity(json!({"mechanical_issues": text})).await;
            assert!(d.blocking_flag, "{text} should block");
            assert_eq!(d.severity, Severity::High);
            assert_eq!(d.recommendation, INTEGRITY_VETO_RECOMMENDATION);
        }
    }

    #[tokio::test]
    async fn test_integrity_scans_marker_fields() {
        let d = integrity(json!({"integrity_notes": "Annulus leak suspected"})).await;
        assert!(d.blocking_flag);

        let d = integrity(json!({"well_notes": "Casing collapse"})).await;
        assert!(!d.blocking_flag, "fields outside scope are not scanned");
    }

    #[tokio::test]
    async fn test_integrity_clear() {
        let d = integrity(json!({"mechanical_issues": "None", "casing_status": "Intact"})).await;
        assert!(!d.blocking_flag);
        assert_eq!(d.severity, Severity::Low);

        let d = integrity(json!({"casing_status": "Minor wear, pressure tested 2023"})).await;
        assert!(!d.blocking_flag);
        assert_eq!(d.severity, Severity::Medium);
    }
}
