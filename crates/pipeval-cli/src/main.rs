use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pipeval_core::Cell;
use pipeval_rules::{EngineConfig, ValidationEngine, ValidationRequest};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "pipeval")]
#[command(about = "Validate sales pipeline spreadsheet exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a sheet and print the response as JSON.
    Validate {
        file: PathBuf,
        /// Input format; inferred from the file extension when omitted.
        #[arg(long, value_enum)]
        format: Option<InputFormat>,
        /// YAML engine config. Falls back to PIPEVAL_CONFIG.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
        /// Print only rows with errors. Totals still cover the whole sheet.
        #[arg(long)]
        only_invalid: bool,
    },
    /// Run the HTTP handler.
    Serve {
        /// Overrides PIPEVAL_WEB_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    Json,
    Csv,
}

impl InputFormat {
    fn infer(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate {
            file,
            format,
            config,
            pretty,
            only_invalid,
        } => {
            let engine = ValidationEngine::new(load_config(config.as_deref())?)?;
            let format = format.unwrap_or_else(|| InputFormat::infer(&file));
            let request = read_request(&file, format)?;
            debug!(path = %file.display(), rows = request.raw_rows.len(), "sheet loaded");

            let mut response = engine.validate_sheet(&request, Utc::now());
            if only_invalid {
                response.results.retain(|result| !result.valid);
            }
            let out = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{out}");
        }
        Commands::Serve { port } => match port {
            Some(port) => {
                let engine = ValidationEngine::new(load_config(None)?)?;
                pipeval_web::serve(engine, port).await?;
            }
            None => pipeval_web::serve_from_env().await?,
        },
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading engine config");
            EngineConfig::from_yaml_file(path)
                .with_context(|| format!("loading config {}", path.display()))
        }
        None => EngineConfig::from_env().context("loading config from environment"),
    }
}

fn read_request(path: &Path, format: InputFormat) -> Result<ValidationRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    match format {
        InputFormat::Json => parse_json(&text).with_context(|| format!("parsing {}", path.display())),
        InputFormat::Csv => parse_csv(&text).with_context(|| format!("parsing {}", path.display())),
    }
}

/// Accepts a bare matrix or a full request object with overrides and toggles.
fn parse_json(text: &str) -> Result<ValidationRequest> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    match value {
        serde_json::Value::Array(_) => {
            let raw_rows: Vec<Vec<Cell>> = serde_json::from_value(value)?;
            Ok(ValidationRequest::new(raw_rows))
        }
        serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
        other => bail!("expected a row matrix or a request object, found {other}"),
    }
}

/// The header row stays in the matrix; the engine resolves it.
fn parse_csv(text: &str) -> Result<ValidationRequest> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(text.as_bytes());

    let mut raw_rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("csv line {}", idx + 1))?;
        raw_rows.push(record.iter().map(Cell::from).collect());
    }
    Ok(ValidationRequest::new(raw_rows))
}
