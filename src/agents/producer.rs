//! Diagnosis capability boundary
//!
//! One generic capability, parameterised by an `AgentPersona`, yields both
//! diagnostic opinions. Any backend (rule engine, hosted model, local
//! model) that implements `DiagnosisProducer` can be swapped in without
//! touching the arbitrator or the orchestrator.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{AgentDiagnosis, WellAttributes};

/// Which diagnostic opinion a persona produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    /// Production potential vs. current rate
    Production,
    /// Mechanical and safety integrity (holds the veto)
    Integrity,
}

impl std::fmt::Display for PersonaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Integrity => write!(f, "integrity"),
        }
    }
}

/// Configuration object for one diagnostic call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPersona {
    /// Display name, e.g. "Production Agent"
    pub name: String,
    pub role: PersonaRole,
    /// Natural-language behaviour contract handed to the backend
    pub instructions: String,
}

/// Explicit failure of a diagnosis call. Never replaced by a guess.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityFailure {
    #[error("diagnosis timed out after {0:?}")]
    Timeout(Duration),
    #[error("diagnosis backend unavailable: {0}")]
    Unavailable(String),
    #[error("diagnosis backend returned HTTP {0}")]
    Rejected(u16),
    #[error("diagnosis response malformed: {0}")]
    Malformed(String),
}

/// Trait for diagnosis backends
///
/// Implementations must be thread-safe so one backend can serve both
/// personas, possibly concurrently.
#[async_trait]
pub trait DiagnosisProducer: Send + Sync {
    /// Produce a structured diagnosis for one well under one persona.
    async fn assess(
        &self,
        persona: &AgentPersona,
        well_id: &str,
        attributes: &WellAttributes,
    ) -> Result<AgentDiagnosis, CapabilityFailure>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
