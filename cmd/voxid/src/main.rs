//! voxid - speaker identification service and CLI.

mod app;
mod config;
mod export;
mod server;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use config::Settings;

/// Speaker identification: enroll voices, identify utterances.
///
/// Settings are read from ~/.voxid/config.yaml when present and can be
/// overridden with environment variables (APP_PORT, QDRANT_URL, TOPK, ...).
#[derive(Parser)]
#[command(name = "voxid")]
#[command(about = "Speaker identification service")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.voxid/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON instead of YAML
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve,
    /// Enroll one or more recordings for a speaker
    Enroll {
        /// Speaker name
        name: String,
        /// Audio files (wav, flac, mp3, ogg, ...)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Identify the speaker of a recording
    Identify {
        file: PathBuf,
        /// Acceptance threshold (default from config)
        #[arg(long)]
        threshold: Option<f32>,
        /// Number of candidates (default from config)
        #[arg(long)]
        topk: Option<usize>,
    },
    /// List enrolled speakers
    Profiles,
    /// Delete one speaker or the whole catalog
    Reset(ResetArgs),
    /// Recompute every centroid from the stored samples
    Rebuild,
    /// Export the catalog to a file
    Export(ExportArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ResetArgs {
    /// Speaker to delete
    #[arg(long)]
    name: Option<String>,
    /// Delete every speaker
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file
    #[arg(long)]
    out: PathBuf,
    #[arg(long, value_enum, default_value = "master")]
    tier: export::Tier,
    /// Output format (default from the file extension)
    #[arg(long, value_enum)]
    format: Option<export::Format>,
    /// Leave embeddings out
    #[arg(long)]
    no_vectors: bool,
    /// Export at most N records
    #[arg(long)]
    limit: Option<usize>,
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print<T: Serialize>(cli: &Cli, value: &T) -> Result<()> {
    let text = if cli.json {
        serde_json::to_string_pretty(value)?
    } else {
        serde_yaml::to_string(value)?
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn read_audio(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&settings.log.level, cli.verbose);

    let service = app::build_service(&settings).await?;

    match &cli.command {
        Commands::Serve => server::serve(&settings.server, service).await,
        Commands::Enroll { name, files } => {
            let mut results = Vec::with_capacity(files.len());
            for file in files {
                let e = service
                    .enroll_audio(name, read_audio(file)?)
                    .await
                    .with_context(|| format!("failed to enroll {}", file.display()))?;
                results.push(e);
            }
            print(&cli, &results)
        }
        Commands::Identify {
            file,
            threshold,
            topk,
        } => {
            let id = service
                .identify_audio(read_audio(file)?, *threshold, *topk)
                .await?;
            print(&cli, &id)
        }
        Commands::Profiles => print(&cli, &service.profiles().await?),
        Commands::Reset(args) => {
            if args.all {
                service.reset_all().await?;
                eprintln!("deleted all speakers");
            } else if let Some(name) = &args.name {
                let removed = service.reset(name).await?;
                eprintln!("deleted {name} ({removed} samples)");
            }
            Ok(())
        }
        Commands::Rebuild => {
            let report = service.rebuild().await?;
            print(&cli, &report)?;
            if !report.failures.is_empty() {
                anyhow::bail!("{} speaker(s) failed to rebuild", report.failures.len());
            }
            Ok(())
        }
        Commands::Export(args) => {
            let format = match args.format {
                Some(f) => f,
                None => export::Format::for_path(&args.out)?,
            };
            let rows =
                export::rows(service.store(), args.tier, !args.no_vectors, args.limit).await?;
            export::write(&rows, &args.out, format)?;
            eprintln!("exported {} record(s) to {}", rows.len(), args.out.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn reset_requires_a_target() {
        assert!(Cli::try_parse_from(["voxid", "reset"]).is_err());
        assert!(Cli::try_parse_from(["voxid", "reset", "--name", "a", "--all"]).is_err());
        assert!(Cli::try_parse_from(["voxid", "reset", "--all"]).is_ok());
    }

    #[test]
    fn export_args() {
        let cli = Cli::try_parse_from([
            "voxid", "export", "--out", "x.yaml", "--tier", "raw", "--no-vectors", "--limit", "3",
        ])
        .unwrap();
        let Commands::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.tier, export::Tier::Raw);
        assert!(args.no_vectors);
        assert_eq!(args.limit, Some(3));
        assert!(args.format.is_none());
    }
}
