use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use gl_mapping_engine::{
    load_catalog, load_drafts_json, load_layout_json, load_mappings_json, ConnectionLine, EngineConfig, LineStyle,
    MappingSession, Universe,
};

/// Validate and inspect GL account mappings between two charts of accounts.
#[derive(Parser, Debug)]
#[command(name = "gl-mapping", version, about)]
struct Cli {
    /// Source (incumbent) accounts CSV
    #[arg(long = "source-accounts", global = true)]
    source_accounts: Option<PathBuf>,

    /// Target accounts CSV
    #[arg(long = "target-accounts", global = true)]
    target_accounts: Option<PathBuf>,

    /// Current mapping set (JSON array); empty when omitted
    #[arg(short = 'm', long = "mappings", global = true)]
    mappings: Option<PathBuf>,

    /// Engine config JSON
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the cardinality validator and print the result
    Validate {
        /// Exit with status 1 when blocking errors are found
        #[arg(long)]
        strict: bool,
    },

    /// List accounts with no mapping in either universe
    Unmapped,

    /// Summarize the mappings touching one account
    Summary {
        #[arg(value_enum)]
        universe: UniverseArg,
        account: String,
    },

    /// Create mappings in bulk and print the outcome plus the new validation
    Import {
        /// JSON array of mapping drafts
        drafts: PathBuf,

        /// Write the resulting mapping set here
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Compute connector lines for a rendered layout
    Connectors {
        /// Layout JSON (columns, rows, scroll offsets)
        layout: PathBuf,

        /// Mapping id to draw as selected
        #[arg(long)]
        selected: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UniverseArg {
    Source,
    Target,
}

impl From<UniverseArg> for Universe {
    fn from(arg: UniverseArg) -> Self {
        match arg {
            UniverseArg::Source => Universe::Source,
            UniverseArg::Target => Universe::Target,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnmappedReport<'a> {
    unmapped_incumbent: &'a [String],
    unmapped_eagle: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderedConnector<'a> {
    #[serde(flatten)]
    line: &'a ConnectionLine,
    path: String,
    style: LineStyle,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn required<'a>(path: &'a Option<PathBuf>, flag: &str) -> Result<&'a Path> {
    path.as_deref()
        .with_context(|| format!("--{} is required for this command", flag))
}

fn open_session(cli: &Cli, config: &EngineConfig) -> Result<MappingSession> {
    let catalog = load_catalog(
        required(&cli.source_accounts, "source-accounts")?,
        required(&cli.target_accounts, "target-accounts")?,
    )?;
    let mappings = match &cli.mappings {
        Some(path) => load_mappings_json(path)?,
        None => Vec::new(),
    };

    Ok(MappingSession::with_config(catalog, mappings, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;
    let mut session = open_session(&cli, &config)?;

    match &cli.command {
        Command::Validate { strict } => {
            let validation = session.validation();
            tracing::info!("{}", validation.summary());
            print_json(validation)?;
            if *strict && !validation.is_valid {
                std::process::exit(1);
            }
        }
        Command::Unmapped => {
            let validation = session.validation();
            print_json(&UnmappedReport {
                unmapped_incumbent: &validation.unmapped_incumbent,
                unmapped_eagle: &validation.unmapped_eagle,
            })?;
        }
        Command::Summary { universe, account } => {
            print_json(&session.account_summary((*universe).into(), account))?;
        }
        Command::Import { drafts, output } => {
            let result = session.bulk_create(load_drafts_json(drafts)?);
            for failure in &result.errors {
                tracing::warn!(index = failure.index, "draft rejected: {}", failure.error);
            }

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&session.store().to_vec())?;
                std::fs::write(path, json).with_context(|| format!("Failed to write mappings: {:?}", path))?;
            }

            print_json(&serde_json::json!({
                "result": result,
                "validation": session.validation(),
            }))?;
        }
        Command::Connectors { layout, selected } => {
            let layout = load_layout_json(layout)?;
            if !session.select(selected.as_deref()) {
                tracing::warn!("selected mapping not found: {:?}", selected);
            }
            session.on_frame(&layout);

            let rendered: Vec<RenderedConnector> = session
                .connections()
                .iter()
                .map(|line| RenderedConnector {
                    line,
                    path: session.connection_path(line),
                    style: line.style(&config.palette),
                })
                .collect();
            print_json(&rendered)?;
        }
    }

    Ok(())
}
