//! Orchestrator - end-to-end screening of one well
//!
//! ## Flow
//!
//! ```text
//! process(well) ──► memory.recall ──hit──► return cached decision
//!                        │ miss / force_refresh
//!                        ▼
//!               production persona ─┐
//!               integrity persona  ─┴─► Arbitrator ──► memory.save ──► return
//! ```
//!
//! A diagnosis failure (timeout, transport, malformed output) aborts the run
//! before anything is written. Overrides go through the same per-well lock
//! as `process`, so a concurrent re-analysis can never clobber a human edit
//! half-way through.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::arbitrator::Arbitrator;
use super::producer::{AgentPersona, CapabilityFailure, DiagnosisProducer};
use crate::config::ScreeningConfig;
use crate::storage::{DecisionMemory, StorageError};
use crate::types::{
    AgentDiagnosis, OverrideError, OverrideRequest, WellAttributes, WorkoverCandidate,
    DEFAULT_OVERRIDE_NOTES, HUMAN_OVERRIDE_PREFIX,
};

// ============================================================================
// Outcome types
// ============================================================================

/// Where a returned decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOrigin {
    /// Served from decision memory, no diagnosis calls made
    CacheHit,
    /// Diagnosed and arbitrated in this run
    Fresh,
}

/// Result of one `process` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    pub decision: WorkoverCandidate,
    pub origin: DecisionOrigin,
    /// Present only for fresh runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production: Option<AgentDiagnosis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<AgentDiagnosis>,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{agent} diagnosis failed: {source}")]
    Capability {
        agent: String,
        #[source]
        source: CapabilityFailure,
    },
    #[error("screening cancelled")]
    Cancelled,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("override rejected: {0}")]
    Override(#[from] OverrideError),
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives cache lookup, both diagnoses, arbitration and persistence.
pub struct Orchestrator {
    producer: Arc<dyn DiagnosisProducer>,
    memory: Arc<DecisionMemory>,
    arbitrator: Arbitrator,
    production: AgentPersona,
    integrity: AgentPersona,
    timeout: Duration,
    parallel: bool,
    /// One async lock per well id, created on first use
    review_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(producer: Arc<dyn DiagnosisProducer>, memory: Arc<DecisionMemory>) -> Self {
        Self {
            producer,
            memory,
            arbitrator: Arbitrator::new(),
            production: AgentPersona::production(),
            integrity: AgentPersona::integrity(),
            timeout: Duration::from_secs(crate::config::defaults::DIAGNOSIS_TIMEOUT_SECS),
            parallel: false,
            review_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Build with the timeout and concurrency settings from `[diagnosis]`.
    pub fn from_config(
        config: &ScreeningConfig,
        producer: Arc<dyn DiagnosisProducer>,
        memory: Arc<DecisionMemory>,
    ) -> Self {
        Self::new(producer, memory)
            .with_timeout(Duration::from_secs(config.diagnosis.timeout_secs))
            .with_parallel(config.diagnosis.parallel)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_personas(mut self, production: AgentPersona, integrity: AgentPersona) -> Self {
        self.production = production;
        self.integrity = integrity;
        self
    }

    pub fn memory(&self) -> &DecisionMemory {
        &self.memory
    }

    pub fn backend_name(&self) -> &'static str {
        self.producer.backend_name()
    }

    /// (decisions arbitrated, integrity vetoes) since startup
    pub fn arbitration_stats(&self) -> (u64, u64) {
        self.arbitrator.stats()
    }

    /// Screen one well.
    ///
    /// Serves a live cached decision unless `force_refresh` is set. On a
    /// fresh run both diagnoses must succeed before anything is persisted.
    pub async fn process(
        &self,
        well_id: &str,
        attributes: &WellAttributes,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<ScreeningOutcome, DriverError> {
        let lock = self.lock_for(well_id);
        let _guard = lock.lock().await;

        if force_refresh {
            info!(well_id, "🔄 Force refresh requested, bypassing memory");
        } else if let Some(decision) = self.memory.recall(well_id) {
            return Ok(ScreeningOutcome {
                decision,
                origin: DecisionOrigin::CacheHit,
                production: None,
                integrity: None,
            });
        }

        info!(
            well_id,
            backend = self.producer.backend_name(),
            parallel = self.parallel,
            "🔍 Running fresh diagnosis"
        );

        let (production, integrity) = if self.parallel {
            let (p, i) = tokio::join!(
                self.diagnose(&self.production, well_id, attributes, cancel),
                self.diagnose(&self.integrity, well_id, attributes, cancel),
            );
            (p?, i?)
        } else {
            let p = self.diagnose(&self.production, well_id, attributes, cancel).await?;
            let i = self.diagnose(&self.integrity, well_id, attributes, cancel).await?;
            (p, i)
        };

        let decision = self.arbitrator.arbitrate(well_id, &production, &integrity);

        if cancel.is_cancelled() {
            warn!(well_id, "Screening cancelled before save, decision discarded");
            return Err(DriverError::Cancelled);
        }
        self.memory.save(well_id, &decision)?;

        Ok(ScreeningOutcome {
            decision,
            origin: DecisionOrigin::Fresh,
            production: Some(production),
            integrity: Some(integrity),
        })
    }

    /// Apply a human edit to the well's decision and persist it.
    ///
    /// The current live decision (if any) is the base. The request is fully
    /// validated before memory is touched.
    pub async fn apply_override(
        &self,
        well_id: &str,
        request: &OverrideRequest,
    ) -> Result<WorkoverCandidate, DriverError> {
        request.validate(well_id)?;

        let lock = self.lock_for(well_id);
        let _guard = lock.lock().await;

        let base = self.memory.recall(well_id);
        let decision = request.apply(well_id, base)?;
        self.memory.save(well_id, &decision)?;

        info!(
            well_id,
            job_type = %decision.proposed_job_type,
            execution_date = %decision.execution_date,
            "👤 Human override recorded"
        );
        Ok(decision)
    }

    /// Persist an edited decision as a human override.
    ///
    /// Job type, date and notes are taken from `edited`; the integrity block
    /// and provenance are always reset.
    pub async fn override_decision(
        &self,
        well_id: &str,
        edited: &WorkoverCandidate,
    ) -> Result<WorkoverCandidate, DriverError> {
        let notes = edited
            .technical_justification
            .strip_prefix(HUMAN_OVERRIDE_PREFIX)
            .unwrap_or(&edited.technical_justification)
            .trim();
        let request = OverrideRequest {
            job_type: edited.proposed_job_type.clone(),
            execution_date: edited.execution_date.clone(),
            notes: Some(if notes.is_empty() { DEFAULT_OVERRIDE_NOTES } else { notes }.to_string()),
        };
        self.apply_override(well_id, &request).await
    }

    async fn diagnose(
        &self,
        persona: &AgentPersona,
        well_id: &str,
        attributes: &WellAttributes,
        cancel: &CancellationToken,
    ) -> Result<AgentDiagnosis, DriverError> {
        let call = tokio::time::timeout(
            self.timeout,
            self.producer.assess(persona, well_id, attributes),
        );

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DriverError::Cancelled),
            r = call => r.unwrap_or(Err(CapabilityFailure::Timeout(self.timeout))),
        };

        match result {
            Ok(mut diagnosis) => {
                if diagnosis.well_id.as_deref().map_or(true, str::is_empty) {
                    diagnosis.well_id = Some(well_id.to_string());
                }
                if diagnosis.agent_name.trim().is_empty() {
                    diagnosis.agent_name.clone_from(&persona.name);
                }
                let diagnosis = diagnosis.with_normalized_confidence();
                info!(
                    well_id,
                    agent = %persona.name,
                    severity = %diagnosis.severity,
                    blocking = diagnosis.blocking_flag,
                    confidence = diagnosis.confidence_score,
                    "Diagnosis received"
                );
                Ok(diagnosis)
            }
            Err(source) => {
                error!(well_id, agent = %persona.name, error = %source, "Diagnosis failed");
                Err(DriverError::Capability {
                    agent: persona.name.clone(),
                    source,
                })
            }
        }
    }

    fn lock_for(&self, well_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.review_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(well_id.to_string()).or_default())
    }
}
