//! Host configuration, loaded from environment variables at startup and
//! then overridden by command-line flags.

use std::path::PathBuf;

use credscan_core::OrchestratorConfig;

use crate::cli::Cli;

/// Runtime configuration for the credscan host.
#[derive(Debug, Clone)]
pub struct Config {
    /// Recognition engine library, or a directory containing it.
    pub engine_lib: Option<PathBuf>,

    /// `tracing` filter string, e.g. `"info"` or `"credscan_core=debug"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            engine_lib: std::env::var_os("CREDSCAN_ENGINE_LIB")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_level: env_or("CREDSCAN_LOG", "info"),
            log_json: std::env::var("CREDSCAN_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            orchestrator: OrchestratorConfig::from_env(),
        }
    }

    /// Apply flags given on the command line.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(engine) = &cli.engine {
            self.engine_lib = Some(engine.clone());
        }
        if let Some(log) = &cli.log {
            self.log_level = log.clone();
        }
        self.log_json |= cli.log_json;
        if cli.command.strict() {
            self.orchestrator.policy.strict = true;
        }
        self
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
