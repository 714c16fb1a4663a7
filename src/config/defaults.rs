//! System-wide default constants.
//!
//! Centralises magic numbers and paths. Grouped by subsystem.

// ============================================================================
// Configuration discovery
// ============================================================================

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV_VAR: &str = "PETROAGENT_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "petroagent.toml";

// ============================================================================
// Decision memory
// ============================================================================

/// Default location of the decision store.
pub const MEMORY_PATH: &str = "data/workover_memory.json";

/// Days before a cached decision is considered stale.
pub const RETENTION_DAYS: i64 = 7;

/// Upper bound on `retention_days` (one hundred years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

// ============================================================================
// Well data
// ============================================================================

/// Default read-only well attribute file.
pub const WELL_DATA_PATH: &str = "data/mock_db.json";

// ============================================================================
// Diagnosis backend
// ============================================================================

/// Maximum time to wait for a single diagnosis before aborting (seconds).
pub const DIAGNOSIS_TIMEOUT_SECS: u64 = 60;

/// OpenAI-compatible chat completions endpoint.
pub const CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Model requested from the chat backend.
pub const CHAT_MODEL: &str = "gpt-4o-2024-08-06";

/// Environment variable holding the chat backend API key.
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address for `petroagent serve`.
pub const SERVER_ADDR: &str = "127.0.0.1:8080";
