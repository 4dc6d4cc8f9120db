//! credscan – command-line host for the extraction orchestrator.
//!
//! Startup order:
//! 1. Parse command-line flags and environment configuration.
//! 2. Initialise structured tracing on stderr (JSON when requested).
//! 3. Load the native recognition engine.
//! 4. Start the orchestrator and run the requested command.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use credscan_core::engine::NativeEngine;
use credscan_core::Orchestrator;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::from_env().with_cli(&cli);

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "credscan starting");

    // ── 3. Recognition engine ──────────────────────────────────────────────────
    let lib = cfg.engine_lib.as_deref().context(
        "no recognition engine library configured; pass --engine or set CREDSCAN_ENGINE_LIB",
    )?;
    let engine = NativeEngine::from_path(lib)
        .with_context(|| format!("loading recognition engine from {}", lib.display()))?;
    info!(path = %engine.lib_path().display(), "recognition engine loaded");

    // ── 4. Orchestrator ────────────────────────────────────────────────────────
    let orchestrator = Arc::new(Orchestrator::start(Arc::new(engine), cfg.orchestrator.clone())?);

    let code = match cli.command {
        Command::Extract {
            image,
            side,
            run_async: false,
            pretty,
            ..
        } => commands::extract_sync(Arc::clone(&orchestrator), image, side, pretty).await?,
        Command::Extract {
            image,
            side,
            run_async: true,
            pretty,
            ..
        } => commands::extract_async(&orchestrator, image, side, pretty).await?,
        Command::Check { image, side } => {
            commands::check(Arc::clone(&orchestrator), image, side).await?
        }
        Command::Info { pretty } => commands::info(&orchestrator, pretty)?,
    };

    orchestrator.shutdown();
    info!("credscan stopped");
    Ok(code)
}

fn init_tracing(cfg: &Config) {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: CREDSCAN_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
