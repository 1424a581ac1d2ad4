//! texmin - shrink a failing LaTeX document to a minimal reproducer.
//!
//! The document is compiled over and over with parts removed until only a
//! small, still compilable document remains that fails with the same first
//! fatal diagnostic as the original.
//!
//! # Usage
//!
//! ```bash
//! # Minimize with the local pdflatex
//! texmin paper.tex > minimal.tex
//!
//! # Compile inside a container and keep every candidate for inspection
//! texmin paper.tex --docker-image texlive/texlive:latest --keep-artifacts
//!
//! # Start from a configuration file and write a JSON report
//! texmin paper.tex --config texmin.toml --report report.json
//! ```
//!
//! The minimized document is written to stdout; logs go to stderr.

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use config::{LoggingConfig, TexminConfig};
use texmin_minimizer::Driver;
use texmin_oracle::{CompilerOracle, ProcessOracle, RunContext};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CLI arguments for texmin.
#[derive(Parser, Debug)]
#[command(
    name = "texmin",
    about = "Shrink a failing LaTeX document to the fragment that reproduces its error",
    version
)]
pub struct CliArgs {
    /// The failing LaTeX document.
    #[arg(value_name = "FILE", required_unless_present = "print_config")]
    file: Option<PathBuf>,

    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Compiler executable (pdflatex, xelatex, lualatex, ...).
    #[arg(long, value_name = "PROG")]
    compiler: Option<String>,

    /// Compile inside this Docker image.
    #[arg(long, value_name = "IMAGE")]
    docker_image: Option<String>,

    /// Per-compilation timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Directory for candidate artifacts.
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Keep every candidate directory.
    #[arg(long)]
    keep_artifacts: bool,

    /// Stop after this many compilations.
    #[arg(long, value_name = "N")]
    max_oracle_calls: Option<usize>,

    /// Do not step into \newcommand-style definitions.
    #[arg(long)]
    no_definitions: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable JSON log output.
    #[arg(long)]
    json_logs: bool,

    /// Write a JSON report of the run to this file.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Print the default configuration and exit.
    #[arg(long)]
    print_config: bool,
}

/// Initialize tracing/logging on stderr.
fn init_tracing(config: &LoggingConfig, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Failed to parse log filter")?;

    let format = if json_logs || config.format == "json" {
        "json"
    } else {
        &config.format
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
    }

    Ok(())
}

async fn run(args: CliArgs) -> Result<()> {
    if args.print_config {
        let config = TexminConfig::default();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut config = if let Some(ref config_path) = args.config {
        TexminConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        TexminConfig::default()
    };

    config.merge_cli_args(&args);
    config.validate().context("Invalid configuration")?;
    init_tracing(&config.logging, args.json_logs)?;

    let path = args.file.as_ref().context("No input file given")?;
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;

    let oracle = ProcessOracle::new(config.process_oracle_config());
    let driver = Driver::new(config.minimizer_config());
    let ctx = RunContext::new();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        run_id = %ctx.run_id(),
        file = ?path,
        oracle = oracle.name(),
        "texmin starting"
    );

    let minimized = driver.minimize_in(ctx, &source, &oracle).await?;
    info!(
        resolution = %minimized.resolution,
        signature = %minimized.signature,
        stats = %minimized.stats,
        "Minimized document"
    );

    {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(minimized.document.as_bytes())?;
        stdout.flush()?;
    }

    if let Some(ref report) = args.report {
        tokio::fs::write(report, minimized.to_json()?)
            .await
            .with_context(|| format!("Failed to write report to {:?}", report))?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "texmin failed");
            eprintln!("texmin: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::parse_from(["texmin", "paper.tex"]);
        assert_eq!(args.file, Some(PathBuf::from("paper.tex")));
        assert!(args.config.is_none());
        assert!(!args.json_logs);
        assert!(!args.no_definitions);
    }

    #[test]
    fn test_cli_args_with_options() {
        let args = CliArgs::parse_from([
            "texmin",
            "paper.tex",
            "--docker-image",
            "texlive/texlive:latest",
            "--work-dir",
            "/tmp/texmin",
            "--log-level",
            "debug",
            "--json-logs",
            "--report",
            "out.json",
        ]);

        assert_eq!(args.docker_image, Some("texlive/texlive:latest".to_string()));
        assert_eq!(args.work_dir, Some(PathBuf::from("/tmp/texmin")));
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert!(args.json_logs);
        assert_eq!(args.report, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_file_required_unless_printing_config() {
        assert!(CliArgs::try_parse_from(["texmin"]).is_err());

        let args = CliArgs::parse_from(["texmin", "--print-config"]);
        assert!(args.print_config);
        assert!(args.file.is_none());
    }
}
