//! Shared data structures for workover screening
//!
//! - `WellAttributes`: per-well attribute snapshot from the well data file
//! - `AgentDiagnosis`: output of one diagnostic pass (production or integrity)
//! - `WorkoverCandidate`: final, persistable go/no-go decision
//! - `OverrideRequest`: human supervisor edit of a decision

mod decision;
mod diagnosis;
mod well;

pub use decision::*;
pub use diagnosis::*;
pub use well::*;
