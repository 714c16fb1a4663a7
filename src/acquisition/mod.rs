//! Well data acquisition module
//!
//! Handles loading of the read-only well attribute file.

pub mod well_data;

pub use well_data::{WellDataError, WellRegistry};
