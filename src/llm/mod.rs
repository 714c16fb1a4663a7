//! Diagnosis Backends
//!
//! Implementations of `DiagnosisProducer`:
//!
//! - **rules** (default): deterministic thresholds and keyword scan, offline
//! - **chat**: OpenAI-compatible chat completions with JSON output
//!
//! The backend is picked once at startup from `[diagnosis].backend`.

use std::sync::Arc;

use tracing::info;

use crate::agents::DiagnosisProducer;
use crate::config::{BackendKind, ScreeningConfig};

pub mod chat;
pub mod rules;

pub use chat::ChatCompletionBackend;
pub use rules::RuleEngineBackend;

/// Build the configured diagnosis backend.
pub fn build_producer(config: &ScreeningConfig) -> anyhow::Result<Arc<dyn DiagnosisProducer>> {
    let producer: Arc<dyn DiagnosisProducer> = match config.diagnosis.backend {
        BackendKind::Rules => Arc::new(RuleEngineBackend::new(
            config.production.clone(),
            config.integrity.clone(),
        )),
        BackendKind::Chat => Arc::new(ChatCompletionBackend::from_config(&config.diagnosis)?),
    };
    info!(backend = producer.backend_name(), "Diagnosis backend ready");
    Ok(producer)
}
