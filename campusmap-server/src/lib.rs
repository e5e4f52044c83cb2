//! Command-line interface and HTTP surface for the campus map service.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use campusmap_core::ProjectionMode;
use campusmap_data::{LoadOptions, LoadSummary, load_extract_report};
use cap_std::{ambient_authority, fs_utf8};
use clap::{Parser, Subcommand};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

mod error;
pub mod http;
mod logging;
mod serve;

pub use error::CliError;
pub use logging::init_logging;

use serve::ServeArgs;

const ARG_DATASET: &str = "dataset";
const ARG_CACHE_URL: &str = "cache-url";
const ARG_CACHE_CAPACITY: &str = "cache-capacity";
const ARG_SNAP_RADIUS: &str = "snap-radius";
const ARG_QUERY_TIMEOUT_MS: &str = "query-timeout-ms";
const ARG_MAX_EXPANSIONS: &str = "max-expansions";
const ARG_LISTEN: &str = "listen";
const ENV_SERVE_DATASET: &str = "CAMPUSMAP_CMDS_SERVE_DATASET";
const ENV_INSPECT_DATASET: &str = "CAMPUSMAP_CMDS_INSPECT_DATASET";

/// Run the `campusmap` binary with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging()?;
    match cli.command {
        Command::Serve(args) => serve::run_serve(args.into_config()?),
        Command::Inspect(args) => run_inspect(&args.into_config()?, &mut io::stdout().lock()),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "campusmap",
    about = "Nearest, bounding-box, routing and room queries over a campus OSM extract",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load an extract and answer queries over HTTP.
    Serve(ServeArgs),
    /// Load an extract and print what it contains.
    Inspect(InspectArgs),
}

/// CLI arguments for the `inspect` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Summarise an extract without serving it")]
#[ortho_config(prefix = "CAMPUSMAP")]
struct InspectArgs {
    /// Path to the OSM PBF or Overpass JSON extract.
    #[arg(long = ARG_DATASET, value_name = "path")]
    #[serde(default)]
    dataset: Option<Utf8PathBuf>,
    /// Keep input coordinates instead of projecting to metres.
    #[arg(long)]
    #[serde(default)]
    planar: bool,
}

impl InspectArgs {
    fn into_config(self) -> Result<InspectConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        InspectConfig::try_from(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InspectConfig {
    dataset: Utf8PathBuf,
    projection: ProjectionMode,
}

impl TryFrom<InspectArgs> for InspectConfig {
    type Error = CliError;

    fn try_from(args: InspectArgs) -> Result<Self, Self::Error> {
        let dataset = args.dataset.ok_or(CliError::MissingArgument {
            field: ARG_DATASET,
            env: ENV_INSPECT_DATASET,
        })?;
        Ok(Self {
            dataset,
            projection: projection_mode(args.planar),
        })
    }
}

/// Element counts printed by `inspect`.
#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    dataset: &'a Utf8Path,
    nodes: u64,
    ways: u64,
    relations: u64,
    features: u64,
    skipped: u64,
    /// `[min_lon, min_lat, max_lon, max_lat]`.
    bounds: Option<[f64; 4]>,
}

impl<'a> InspectReport<'a> {
    fn new(dataset: &'a Utf8Path, summary: &LoadSummary) -> Self {
        Self {
            dataset,
            nodes: summary.nodes,
            ways: summary.ways,
            relations: summary.relations,
            features: summary.features,
            skipped: summary.skipped,
            bounds: summary
                .bounds
                .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y]),
        }
    }
}

fn run_inspect(config: &InspectConfig, out: &mut impl Write) -> Result<(), CliError> {
    require_existing(&config.dataset, ARG_DATASET)?;
    let report = load_extract_report(
        &config.dataset,
        &LoadOptions {
            projection: config.projection,
        },
    )?;
    let rendered = serde_json::to_string_pretty(&InspectReport::new(&config.dataset, &report.summary))
        .map_err(CliError::SerializeSummary)?;
    writeln!(out, "{rendered}").map_err(CliError::WriteOutput)
}

fn projection_mode(planar: bool) -> ProjectionMode {
    if planar {
        ProjectionMode::Planar
    } else {
        ProjectionMode::LocalMetres
    }
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    let metadata = fs_utf8::File::open_ambient(path, ambient_authority()).and_then(|file| file.metadata());
    match metadata {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
