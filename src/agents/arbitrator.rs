//! Arbitrator - conflict resolution between the two diagnoses
//!
//! ## Resolution Rules (strict priority)
//!
//! 1. **Safety gate**: integrity `blocking_flag` set → "NO GO", integrity
//!    block, justification states the integrity veto. Production content
//!    only colours the justification.
//! 2. **Economic path**: integrity clear and production recommends work →
//!    job type mapped from the production issue text.
//! 3. **Null path**: integrity clear, no production recommendation →
//!    "NO ACTION REQUIRED".
//!
//! Confidence scores never influence the outcome. No economic case can
//! outrank a blocking integrity flag.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::types::{
    AgentDiagnosis, DecisionSource, WorkoverCandidate, DATE_TBD, NO_ACTION_REQUIRED, NO_GO,
};

/// Fallback when the production issue names no recognisable cause.
pub const GENERIC_JOB_TYPE: &str = "Production Enhancement Workover";

/// Word-prefix stems → job type. First matching row wins.
const JOB_TYPE_RULES: &[(&[&str], &str)] = &[
    (&["scale", "skin", "damage", "acid"], "Acid Stimulation"),
    (&["water", "coning"], "Water Shut-off"),
    (&["pump", "esp", "rod", "lift"], "Artificial Lift Optimization"),
    (&["perforat"], "Re-perforation"),
    (&["frac", "permeab"], "Hydraulic Fracturing"),
    (&["paraffin", "wax", "asphaltene"], "Chemical Treatment"),
];

/// Pick a job type consistent with the described production issue.
pub fn select_job_type(production: &AgentDiagnosis) -> &'static str {
    let text = format!("{} {}", production.issue_detected, production.recommendation).to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    JOB_TYPE_RULES
        .iter()
        .find(|(stems, _)| stems.iter().any(|s| words.iter().any(|w| w.starts_with(s))))
        .map_or(GENERIC_JOB_TYPE, |&(_, job)| job)
}

/// Resolve both diagnoses into one decision. Pure.
pub fn arbitrate(
    well_id: &str,
    production: &AgentDiagnosis,
    integrity: &AgentDiagnosis,
) -> WorkoverCandidate {
    let (job_type, justification, integrity_block) = if integrity.blocking_flag {
        (
            NO_GO.to_string(),
            format!(
                "Integrity review vetoed the job: {}. Integrity recommendation: {}. \
                 Production case set aside ({}).",
                integrity.issue_detected.trim_end_matches('.'),
                integrity.recommendation.trim_end_matches('.'),
                production.recommendation.trim_end_matches('.'),
            ),
            true,
        )
    } else if production.recommends_intervention() {
        let job = select_job_type(production);
        (
            job.to_string(),
            format!(
                "Integrity review clear ({}). Production case: {}. {}. Selected {} \
                 (production severity {}).",
                integrity.issue_detected.trim_end_matches('.'),
                production.issue_detected.trim_end_matches('.'),
                production.recommendation.trim_end_matches('.'),
                job,
                production.severity,
            ),
            false,
        )
    } else {
        (
            NO_ACTION_REQUIRED.to_string(),
            format!(
                "Integrity review clear and production review does not call for work: {}. \
                 No intervention scheduled.",
                production.recommendation.trim_end_matches('.'),
            ),
            false,
        )
    };

    WorkoverCandidate {
        well_id: well_id.to_string(),
        proposed_job_type: job_type,
        technical_justification: justification,
        integrity_block,
        execution_date: DATE_TBD.to_string(),
        source: DecisionSource::Ai,
    }
}

/// Arbitrator with decision counting for diagnostics
#[derive(Debug, Default)]
pub struct Arbitrator {
    decisions_made: AtomicU64,
    vetoes: AtomicU64,
}

impl Arbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arbitrate(
        &self,
        well_id: &str,
        production: &AgentDiagnosis,
        integrity: &AgentDiagnosis,
    ) -> WorkoverCandidate {
        let decision = arbitrate(well_id, production, integrity);

        self.decisions_made.fetch_add(1, Ordering::Relaxed);
        if decision.integrity_block {
            self.vetoes.fetch_add(1, Ordering::Relaxed);
        }

        info!(
            well_id,
            job_type = %decision.proposed_job_type,
            verdict = %decision.verdict(),
            production_confidence = production.confidence_score,
            integrity_confidence = integrity.confidence_score,
            "Arbitration complete"
        );

        decision
    }

    /// (decisions made, integrity vetoes)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.decisions_made.load(Ordering::Relaxed),
            self.vetoes.load(Ordering::Relaxed),
        )
    }
}
