//! Provenant CLI - verify provenance documents from the command line.
//!
//! Exit codes: `0` valid, `1` invalid, `2` engine error (unreadable or
//! unparseable document).

use clap::Parser;
use provenant_core::{EngineError, Mode, Verifier, VerifierConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "provenant")]
#[command(about = "Verification engine for attestable provenance documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate a document and report every error and warning
    Verify {
        /// Document path (.gg.yaml or canonical .gg.json)
        path: PathBuf,

        /// Elevate selected warnings to errors
        #[arg(long)]
        strict: bool,

        /// Suppress warnings from the report
        #[arg(long, conflicts_with = "strict")]
        quiet: bool,

        /// Emit the structured result as JSON
        #[arg(long)]
        json: bool,

        /// Accept mock signatures (test harnesses only)
        #[arg(long, hide = true)]
        allow_mock: bool,
    },
    /// Print the canonical form of a document
    Canon {
        /// Document path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Verify {
            path,
            strict,
            quiet,
            json,
            allow_mock,
        } => {
            let mut config = VerifierConfig::default();
            config.mode = if strict {
                Mode::Strict
            } else if quiet {
                Mode::Quiet
            } else {
                Mode::Standard
            };
            config.allow_mock_signatures = allow_mock;

            let verifier = Verifier::new(config)?;
            let result = match verifier.verify_path(&path).await {
                Ok(result) => result,
                Err(e @ (EngineError::Io(_) | EngineError::Load(_))) => {
                    eprintln!("error: {e}");
                    return Ok(ExitCode::from(2));
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for error in &result.errors {
                    println!("error: {error}");
                }
                for warning in &result.warnings {
                    println!("warning: {warning}");
                }
                println!(
                    "{}: {} error(s), {} warning(s)",
                    if result.valid { "VALID" } else { "INVALID" },
                    result.errors.len(),
                    result.warnings.len()
                );
            }

            Ok(if result.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Canon { path } => {
            let bytes = std::fs::read(&path)?;
            let loaded = provenant_model::load_document(
                &bytes,
                provenant_model::loader::DEFAULT_MAX_DOCUMENT_BYTES,
            )?;
            println!(
                "{}",
                provenant_model::loader::to_canonical_string(&loaded.document)?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
