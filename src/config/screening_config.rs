//! Screening Configuration - operator-tunable TOML values
//!
//! Every threshold the diagnostic personas and the decision memory use is a
//! field here. Each struct implements `Default` so a missing file (or a
//! missing section) behaves exactly like the built-in values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a screening deployment.
///
/// Load with `ScreeningConfig::load()` which searches:
/// 1. `$PETROAGENT_CONFIG` env var
/// 2. `./petroagent.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Decision memory (cache) settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Well attribute source
    #[serde(default)]
    pub wells: WellDataConfig,

    /// Diagnosis backend selection and call limits
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,

    /// Production persona thresholds
    #[serde(default)]
    pub production: ProductionConfig,

    /// Integrity persona keyword scan
    #[serde(default)]
    pub integrity: IntegrityConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl ScreeningConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PETROAGENT_CONFIG` environment variable
    /// 2. `./petroagent.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded screening config from PETROAGENT_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from PETROAGENT_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "PETROAGENT_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded screening config from ./{}", defaults::CONFIG_FILE_NAME);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::CONFIG_FILE_NAME);
                }
            }
        }

        info!("No {} found, using built-in defaults", defaults::CONFIG_FILE_NAME);
        Self::default()
    }

    /// Load from a specific TOML file path and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| match e {
                ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
                other => other,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating (used by tests and `load_from_file`).
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))
    }

    /// Serialize to pretty TOML (for `--print-config` style tooling).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every value and report all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !(1..=defaults::MAX_RETENTION_DAYS).contains(&self.memory.retention_days) {
            errors.push(format!(
                "memory.retention_days must be between 1 and {}, got {}",
                defaults::MAX_RETENTION_DAYS,
                self.memory.retention_days
            ));
        }
        if self.memory.path.as_os_str().is_empty() {
            errors.push("memory.path must not be empty".to_string());
        }
        if self.diagnosis.timeout_secs < 1 {
            errors.push("diagnosis.timeout_secs must be at least 1".to_string());
        }
        if self.diagnosis.backend == BackendKind::Chat {
            if self.diagnosis.endpoint.trim().is_empty() {
                errors.push("diagnosis.endpoint is required for the chat backend".to_string());
            }
            if self.diagnosis.model.trim().is_empty() {
                errors.push("diagnosis.model is required for the chat backend".to_string());
            }
        }
        if !(0.0..=2.0).contains(&self.diagnosis.temperature) {
            errors.push(format!(
                "diagnosis.temperature ({}) must be within 0.0..=2.0",
                self.diagnosis.temperature
            ));
        }

        let p = &self.production;
        if !(p.uplift_margin > 0.0) {
            errors.push(format!("production.uplift_margin ({}) must be > 0", p.uplift_margin));
        }
        if !(p.high_water_cut > 0.0 && p.high_water_cut <= 1.0) {
            errors.push(format!(
                "production.high_water_cut ({}) must be a fraction in (0, 1]",
                p.high_water_cut
            ));
        }
        if p.massive_upside_margin < p.uplift_margin {
            errors.push(format!(
                "production.massive_upside_margin ({}) must be >= uplift_margin ({})",
                p.massive_upside_margin, p.uplift_margin
            ));
        }

        if self.integrity.keywords.iter().all(|k| k.trim().is_empty()) {
            errors.push("integrity.keywords must contain at least one keyword".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Decision memory location and retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// JSON store file. Parent directory is created on open.
    #[serde(default = "default_memory_path")]
    pub path: PathBuf,

    /// Days a decision stays valid before it is re-analysed.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_memory_path() -> PathBuf { PathBuf::from(defaults::MEMORY_PATH) }
fn default_retention_days() -> i64 { defaults::RETENTION_DAYS }

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            retention_days: default_retention_days(),
        }
    }
}

// ============================================================================
// Well data
// ============================================================================

/// Read-only well attribute file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellDataConfig {
    #[serde(default = "default_wells_path")]
    pub path: PathBuf,
}

fn default_wells_path() -> PathBuf { PathBuf::from(defaults::WELL_DATA_PATH) }

impl Default for WellDataConfig {
    fn default() -> Self {
        Self { path: default_wells_path() }
    }
}

// ============================================================================
// Diagnosis backend
// ============================================================================

/// Which implementation answers diagnosis requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Deterministic keyword/threshold engine (offline)
    #[default]
    Rules,
    /// OpenAI-compatible chat completions endpoint
    Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Per-call limit. Expiry counts as a capability failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Issue the production and integrity calls concurrently.
    #[serde(default)]
    pub parallel: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub temperature: f64,
}

fn default_timeout_secs() -> u64 { defaults::DIAGNOSIS_TIMEOUT_SECS }
fn default_endpoint() -> String { defaults::CHAT_ENDPOINT.to_string() }
fn default_model() -> String { defaults::CHAT_MODEL.to_string() }
fn default_api_key_env() -> String { defaults::API_KEY_ENV_VAR.to_string() }

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            timeout_secs: default_timeout_secs(),
            parallel: false,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
        }
    }
}

// ============================================================================
// Production persona
// ============================================================================

/// Thresholds for the production persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Relative uplift (potential over current) above which intervention
    /// is recommended. 0.20 = potential more than 20% above current.
    #[serde(default = "default_uplift_margin")]
    pub uplift_margin: f64,

    /// Water cut fraction above which a well is flagged High Risk.
    #[serde(default = "default_high_water_cut")]
    pub high_water_cut: f64,

    /// Uplift large enough to justify a high-water-cut well anyway.
    #[serde(default = "default_massive_upside_margin")]
    pub massive_upside_margin: f64,
}

fn default_uplift_margin() -> f64 { 0.20 }
fn default_high_water_cut() -> f64 { 0.90 }
fn default_massive_upside_margin() -> f64 { 1.0 }

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            uplift_margin: default_uplift_margin(),
            high_water_cut: default_high_water_cut(),
            massive_upside_margin: default_massive_upside_margin(),
        }
    }
}

// ============================================================================
// Integrity persona
// ============================================================================

/// Keyword scan for the integrity persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Case-insensitive stems. Any hit vetoes intervention.
    #[serde(default = "default_integrity_keywords")]
    pub keywords: Vec<String>,

    /// Fields always scanned. Keys containing "mechanical", "casing" or
    /// "integrity" are scanned as well.
    #[serde(default = "default_integrity_fields")]
    pub fields: Vec<String>,
}

fn default_integrity_keywords() -> Vec<String> {
    ["collaps", "leak", "restrict", "sand", "corros"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_integrity_fields() -> Vec<String> {
    vec!["mechanical_issues".to_string(), "casing_status".to_string()]
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            keywords: default_integrity_keywords(),
            fields: default_integrity_fields(),
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Can be overridden by the `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String { defaults::SERVER_ADDR.to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_server_addr() }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}
