//! Screening Configuration Module
//!
//! Provides deployment configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `PETROAGENT_CONFIG` environment variable (path to TOML file)
//! 3. `petroagent.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded `ScreeningConfig` is passed explicitly to the components that
//! need it; there is no process-global instance.

mod screening_config;
pub mod defaults;

pub use screening_config::*;
