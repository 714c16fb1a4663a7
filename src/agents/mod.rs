//! Diagnostic agents for workover screening
//!
//! ## Components
//!
//! - **DiagnosisProducer**: the single capability both personas call
//! - **Personas**: Production Agent (economics) and Integrity Agent (safety veto)
//! - **Arbitrator**: resolves the two opinions, safety first
//! - **Orchestrator**: cache lookup, diagnosis, arbitration, persistence, overrides

pub mod arbitrator;
pub mod orchestrator;
pub mod personas;
pub mod producer;

pub use arbitrator::{arbitrate, select_job_type, Arbitrator};
pub use orchestrator::{DecisionOrigin, DriverError, Orchestrator, ScreeningOutcome};
pub use personas::{INTEGRITY_AGENT_NAME, PRODUCTION_AGENT_NAME};
pub use producer::{AgentPersona, CapabilityFailure, DiagnosisProducer, PersonaRole};
