use std::path::PathBuf;

use clap::{Parser, Subcommand};
use credscan_types::DocumentSide;

/// Extract structured fields from identity credential images
#[derive(Debug, Parser)]
#[command(name = "credscan")]
#[command(about = "Extract structured fields from identity credential images", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Recognition engine library, or a directory containing it
    /// (overrides CREDSCAN_ENGINE_LIB)
    #[arg(long, global = true)]
    pub engine: Option<PathBuf>,

    /// Log filter, e.g. "info" or "credscan_core=debug" (overrides CREDSCAN_LOG)
    #[arg(long, global = true)]
    pub log: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract one side of a credential and print the record as JSON
    Extract {
        /// Image file (jpg, jpeg, png or bmp)
        image: PathBuf,

        /// Which side the image shows: front or back
        #[arg(long, value_parser = parse_side)]
        side: DocumentSide,

        /// Run as an asynchronous task and print progress; Ctrl-C cancels it
        #[arg(long = "async")]
        run_async: bool,

        /// Also require a well-formed CURP and voter key on the front side
        #[arg(long)]
        strict: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Ask the engine whether an image plausibly shows a credential side
    Check {
        image: PathBuf,

        #[arg(long, value_parser = parse_side)]
        side: DocumentSide,
    },

    /// Print the service capability descriptor
    Info {
        #[arg(long)]
        pretty: bool,
    },
}

impl Command {
    pub fn strict(&self) -> bool {
        matches!(self, Command::Extract { strict: true, .. })
    }
}

fn parse_side(value: &str) -> Result<DocumentSide, String> {
    value
        .parse()
        .map_err(|_| format!("unknown side '{value}'; expected front or back"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_accepts_aliases() {
        let cli = Cli::try_parse_from(["credscan", "check", "a.jpg", "--side", "reverso"])
            .expect("valid arguments");
        assert!(matches!(
            cli.command,
            Command::Check {
                side: DocumentSide::Back,
                ..
            }
        ));
    }

    #[test]
    fn unknown_side_is_rejected() {
        let err = Cli::try_parse_from(["credscan", "extract", "a.jpg", "--side", "top"])
            .expect_err("bad side");
        assert!(err.to_string().contains("expected front or back"));
    }

    #[test]
    fn async_flag_is_parsed() {
        let cli = Cli::try_parse_from(["credscan", "extract", "a.jpg", "--side", "front", "--async"])
            .expect("valid arguments");
        assert!(matches!(cli.command, Command::Extract { run_async: true, .. }));
        assert!(!cli.command.strict());
    }
}
