//! PetroAgent: Workover Candidate Screening
//!
//! Two diagnostic personas review every well; an arbitrator resolves their
//! opinions with safety first; decisions are cached for a retention window
//! and can be overridden by a human supervisor.
//!
//! ## Architecture
//!
//! - **Agents**: personas, the `DiagnosisProducer` boundary, the arbitrator
//!   and the orchestrator that drives a screening run
//! - **LLM Module**: diagnosis backends (deterministic rules, chat completions)
//! - **Storage**: JSON-file decision memory with read-time expiry
//! - **Acquisition**: read-only well attribute registry
//! - **API**: HTTP surface over the orchestrator

pub mod acquisition;
pub mod agents;
pub mod api;
pub mod config;
pub mod llm;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::ScreeningConfig;

// Re-export commonly used types
pub use types::{
    AgentDiagnosis, DecisionSource, OverrideRequest, Severity, Verdict, WellAttributes,
    WorkoverCandidate,
};

// Re-export agents
pub use agents::{
    AgentPersona, Arbitrator, CapabilityFailure, DecisionOrigin, DiagnosisProducer, DriverError,
    Orchestrator, ScreeningOutcome,
};

// Re-export storage
pub use storage::{DecisionMemory, MemoryStats, StorageError};

// Re-export acquisition
pub use acquisition::WellRegistry;
