//! PetroAgent - Workover Candidate Screening
//!
//! # Usage
//!
//! ```bash
//! # List wells in the data file
//! petroagent wells
//!
//! # Screen one well (served from memory when a live decision exists)
//! petroagent diagnose B2
//! petroagent diagnose B2 --force-refresh
//!
//! # Record a supervisor decision
//! petroagent override B2 --job-type "Rig Workover" --date 2025-03-01 --notes "Rig booked"
//!
//! # HTTP API
//! petroagent serve --addr 0.0.0.0:8080
//! ```
//!
//! # Environment Variables
//!
//! - `PETROAGENT_CONFIG`: Path to a TOML config file (default: ./petroagent.toml)
//! - `OPENAI_API_KEY`: Chat backend API key (may live in `.env`)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use petroagent::acquisition::WellRegistry;
use petroagent::agents::{DecisionOrigin, Orchestrator, ScreeningOutcome};
use petroagent::api::{create_app, ApiState};
use petroagent::config::ScreeningConfig;
use petroagent::llm::build_producer;
use petroagent::storage::{DecisionMemory, MemoryStats, StoreLock};
use petroagent::types::{AgentDiagnosis, OverrideRequest, Verdict, WorkoverCandidate};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "petroagent")]
#[command(about = "PetroAgent Workover Candidate Screening")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides PETROAGENT_CONFIG and ./petroagent.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// List well ids in the well data file
    Wells,

    /// Screen one well
    Diagnose {
        well_id: String,
        /// Ignore any cached decision and re-run both diagnoses
        #[arg(long)]
        force_refresh: bool,
    },

    /// Record a human supervisor decision for a well
    Override {
        well_id: String,
        #[arg(long)]
        job_type: String,
        /// Execution date, YYYY-MM-DD
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show decision memory statistics
    Stats,

    /// Run the HTTP API
    Serve {
        /// Override the server address (default from [server].addr)
        #[arg(short, long, value_name = "HOST:PORT")]
        addr: Option<String>,
    },
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ScreeningConfig> {
    match path {
        Some(p) => ScreeningConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => {
            let config = ScreeningConfig::load();
            config.validate().context("Invalid configuration")?;
            Ok(config)
        }
    }
}

/// Everything a command needs. The store lock lives as long as this does.
struct Runtime {
    orchestrator: Arc<Orchestrator>,
    wells: Arc<WellRegistry>,
    _store_lock: StoreLock,
}

fn build_runtime(config: &ScreeningConfig) -> Result<Runtime> {
    let store_lock = StoreLock::acquire(&config.memory.path)?;

    let memory = Arc::new(
        DecisionMemory::open(&config.memory.path, config.memory.retention_days)
            .context("Failed to open decision memory")?,
    );
    let wells = Arc::new(WellRegistry::load(&config.wells.path).context("Failed to load well data")?);
    let producer = build_producer(config).context("Failed to initialise diagnosis backend")?;
    let orchestrator = Arc::new(Orchestrator::from_config(config, producer, memory));

    Ok(Runtime {
        orchestrator,
        wells,
        _store_lock: store_lock,
    })
}

fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown.cancel();
    });
    token
}

// ============================================================================
// Output
// ============================================================================

fn print_diagnosis(label: &str, d: &AgentDiagnosis) {
    println!("  {label} ({}, severity {}, confidence {:.2})", d.agent_name, d.severity, d.confidence_score);
    println!("    Issue:          {}", d.issue_detected);
    println!("    Recommendation: {}", d.recommendation);
    if d.blocking_flag {
        println!("    Blocking:       yes");
    }
}

fn print_decision(decision: &WorkoverCandidate) {
    let banner = match decision.verdict() {
        Verdict::Vetoed => "⛔ DECISION",
        Verdict::NoAction => "➖ DECISION",
        Verdict::Approved => "✅ DECISION",
    };
    println!("{banner}: {} [{}]", decision.proposed_job_type, decision.verdict());
    println!("  Well:          {}", decision.well_id);
    println!("  Justification: {}", decision.technical_justification);
    println!("  📅 Schedule:   {}", decision.execution_date);
    println!("  🏷️ Source:     {}", decision.source);
}

fn stats_lines(stats: &MemoryStats) -> Vec<String> {
    let last_query = stats
        .last_query_time
        .map_or_else(|| "never".to_string(), |ts| ts.to_rfc3339());
    vec![
        format!("  Records:        {}", stats.record_count),
        format!("  Live records:   {}", stats.live_record_count),
        format!("  Retention:      {} days", stats.retention_days),
        format!("  Last query:     {last_query}"),
    ]
}

fn print_outcome(outcome: &ScreeningOutcome) {
    if outcome.origin == DecisionOrigin::CacheHit {
        println!(
            "⚡ CACHE HIT: Retrieved valid analysis from {}",
            outcome.decision.source
        );
    }
    if let Some(p) = &outcome.production {
        print_diagnosis("👷 Production", p);
    }
    if let Some(i) = &outcome.integrity {
        print_diagnosis("🛡️ Integrity", i);
    }
    println!();
    print_decision(&outcome.decision);
}

// ============================================================================
// Commands
// ============================================================================

async fn run_serve(runtime: Runtime, addr: String) -> Result<()> {
    let cancel_token = shutdown_token();
    let state = ApiState {
        shutdown: cancel_token.clone(),
        ..ApiState::new(runtime.orchestrator, runtime.wells)
    };

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("🌐 HTTP API listening on http://{}/api/v1", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await
        .context("HTTP server error")?;

    info!("[HttpServer] Graceful shutdown complete");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "Failed to read .env file");
        }
    }

    let config = load_config(args.config.as_ref())?;
    let runtime = build_runtime(&config)?;

    match args.command {
        SubCommand::Wells => {
            for id in runtime.wells.well_ids() {
                println!("{id}");
            }
        }
        SubCommand::Diagnose {
            well_id,
            force_refresh,
        } => {
            let attributes = runtime
                .wells
                .get(&well_id)
                .with_context(|| format!("Unknown well '{well_id}'"))?;
            let cancel = shutdown_token();
            let outcome = runtime
                .orchestrator
                .process(&well_id, attributes, force_refresh, &cancel)
                .await
                .with_context(|| format!("Screening of {well_id} failed"))?;
            print_outcome(&outcome);
        }
        SubCommand::Override {
            well_id,
            job_type,
            date,
            notes,
        } => {
            if runtime.wells.get(&well_id).is_none() {
                anyhow::bail!("Unknown well '{well_id}'");
            }
            let request = OverrideRequest {
                job_type,
                execution_date: date,
                notes,
            };
            let decision = runtime
                .orchestrator
                .apply_override(&well_id, &request)
                .await
                .context("Override rejected")?;
            println!("Memory updated.");
            print_decision(&decision);
        }
        SubCommand::Stats => {
            let memory = runtime.orchestrator.memory();
            println!("🧠 Decision memory: {}", memory.path().display());
            for line in stats_lines(&memory.stats()) {
                println!("{line}");
            }
        }
        SubCommand::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            run_serve(runtime, addr).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_stats_lines_include_last_query() {
        let mut stats = MemoryStats {
            record_count: 3,
            live_record_count: 2,
            retention_days: 7,
            last_query_time: None,
        };
        let lines = stats_lines(&stats);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "  Last query:     never");

        stats.last_query_time = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).single();
        let lines = stats_lines(&stats);
        assert_eq!(lines[3], "  Last query:     2025-03-01T09:30:00+00:00");
    }
}
