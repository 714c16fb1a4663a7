//! Final workover decision and human override input

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Job type used when the integrity review vetoes intervention.
pub const NO_GO: &str = "NO GO";

/// Job type used when neither review asks for work.
pub const NO_ACTION_REQUIRED: &str = "NO ACTION REQUIRED";

/// Execution date placeholder until a human schedules the job.
pub const DATE_TBD: &str = "TBD";

/// Date format accepted from human overrides.
pub const EXECUTION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Prefix marking a justification written by a human.
pub const HUMAN_OVERRIDE_PREFIX: &str = "HUMAN OVERRIDE: ";

/// Note used when a supervisor approves without comment.
pub const DEFAULT_OVERRIDE_NOTES: &str = "Approved by Senior Engineer.";

/// Who produced the final form of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecisionSource {
    #[default]
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "Human Supervisor")]
    HumanSupervisor,
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ai => write!(f, "AI"),
            Self::HumanSupervisor => write!(f, "Human Supervisor"),
        }
    }
}

/// Persistable go/no-go decision for one well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoverCandidate {
    pub well_id: String,
    /// Free text; "NO GO" when vetoed
    pub proposed_job_type: String,
    pub technical_justification: String,
    pub integrity_block: bool,
    /// `YYYY-MM-DD` or "TBD". Not validated for AI decisions.
    #[serde(default = "default_execution_date")]
    pub execution_date: String,
    #[serde(default)]
    pub source: DecisionSource,
}

fn default_execution_date() -> String {
    DATE_TBD.to_string()
}

/// How surfaces should present a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Integrity veto
    Vetoed,
    /// Nothing to do
    NoAction,
    /// Intervention approved
    Approved,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vetoed => write!(f, "VETOED"),
            Self::NoAction => write!(f, "NO ACTION"),
            Self::Approved => write!(f, "APPROVED"),
        }
    }
}

impl WorkoverCandidate {
    pub fn verdict(&self) -> Verdict {
        if self.integrity_block {
            Verdict::Vetoed
        } else if self.proposed_job_type.eq_ignore_ascii_case(NO_ACTION_REQUIRED)
            || self.proposed_job_type.eq_ignore_ascii_case(NO_GO)
        {
            Verdict::NoAction
        } else {
            Verdict::Approved
        }
    }
}

/// Human-authored edit of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub job_type: String,
    pub execution_date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Rejected override. Nothing is persisted when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    #[error("well id must not be empty")]
    EmptyWellId,
    #[error("job type must not be empty")]
    EmptyJobType,
    #[error("execution date '{0}' is not a valid YYYY-MM-DD date")]
    InvalidDate(String),
}

impl OverrideRequest {
    /// Validate every field before anything is applied.
    pub fn validate(&self, well_id: &str) -> Result<NaiveDate, OverrideError> {
        if well_id.trim().is_empty() {
            return Err(OverrideError::EmptyWellId);
        }
        if self.job_type.trim().is_empty() {
            return Err(OverrideError::EmptyJobType);
        }
        NaiveDate::parse_from_str(self.execution_date.trim(), EXECUTION_DATE_FORMAT)
            .map_err(|_| OverrideError::InvalidDate(self.execution_date.clone()))
    }

    /// Apply to an existing decision (or a blank one).
    ///
    /// Provenance becomes "Human Supervisor" and the integrity block is
    /// cleared regardless of what the prior decision said.
    pub fn apply(
        &self,
        well_id: &str,
        base: Option<WorkoverCandidate>,
    ) -> Result<WorkoverCandidate, OverrideError> {
        let date = self.validate(well_id)?;
        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_OVERRIDE_NOTES);

        let mut decision = base.unwrap_or_else(|| WorkoverCandidate {
            well_id: well_id.to_string(),
            proposed_job_type: String::new(),
            technical_justification: String::new(),
            integrity_block: false,
            execution_date: default_execution_date(),
            source: DecisionSource::Ai,
        });

        decision.well_id = well_id.to_string();
        decision.proposed_job_type = self.job_type.trim().to_string();
        decision.technical_justification = format!("{HUMAN_OVERRIDE_PREFIX}{notes}");
        decision.execution_date = date.format(EXECUTION_DATE_FORMAT).to_string();
        decision.source = DecisionSource::HumanSupervisor;
        decision.integrity_block = false;

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vetoed() -> WorkoverCandidate {
        WorkoverCandidate {
            well_id: "B2".to_string(),
            proposed_job_type: NO_GO.to_string(),
            technical_justification: "Integrity review vetoed the job".to_string(),
            integrity_block: true,
            execution_date: DATE_TBD.to_string(),
            source: DecisionSource::Ai,
        }
    }

    #[test]
    fn test_source_serialises_as_display_strings() {
        let json = serde_json::to_value(vetoed()).unwrap();
        assert_eq!(json["source"], "AI");

        let human = serde_json::to_value(DecisionSource::HumanSupervisor).unwrap();
        assert_eq!(human, "Human Supervisor");
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let json = r#"{
            "well_id": "C3",
            "proposed_job_type": "Acid Stimulation",
            "technical_justification": "skin",
            "integrity_block": false
        }"#;
        let parsed: WorkoverCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.execution_date, "TBD");
        assert_eq!(parsed.source, DecisionSource::Ai);
    }

    #[test]
    fn test_verdict() {
        let mut d = vetoed();
        assert_eq!(d.verdict(), Verdict::Vetoed);
        d.integrity_block = false;
        d.proposed_job_type = NO_ACTION_REQUIRED.to_string();
        assert_eq!(d.verdict(), Verdict::NoAction);
        d.proposed_job_type = "Water Shut-off".to_string();
        assert_eq!(d.verdict(), Verdict::Approved);
    }

    #[test]
    fn test_override_clears_block_and_marks_human() {
        let request = OverrideRequest {
            job_type: "Acid Job".to_string(),
            execution_date: "2025-01-10".to_string(),
            notes: None,
        };
        let updated = request.apply("B2", Some(vetoed())).unwrap();
        assert_eq!(updated.source, DecisionSource::HumanSupervisor);
        assert!(!updated.integrity_block);
        assert_eq!(updated.proposed_job_type, "Acid Job");
        assert_eq!(updated.execution_date, "2025-01-10");
        assert_eq!(
            updated.technical_justification,
            "HUMAN OVERRIDE: Approved by Senior Engineer."
        );
    }

    #[test]
    fn test_override_rejects_bad_input() {
        let mut request = OverrideRequest {
            job_type: "Acid Job".to_string(),
            execution_date: "2025-02-30".to_string(),
            notes: Some("ok".to_string()),
        };
        assert_eq!(
            request.apply("B2", None),
            Err(OverrideError::InvalidDate("2025-02-30".to_string()))
        );

        request.execution_date = "10/01/2025".to_string();
        assert!(matches!(request.validate("B2"), Err(OverrideError::InvalidDate(_))));

        request.execution_date = "2025-01-10".to_string();
        request.job_type = "  ".to_string();
        assert_eq!(request.validate("B2"), Err(OverrideError::EmptyJobType));
        assert_eq!(request.validate(""), Err(OverrideError::EmptyWellId));
    }
}
