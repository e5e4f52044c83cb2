//! Error types emitted by the `campusmap` binary.

use std::{io, net::SocketAddr, sync::Arc};

use camino::Utf8PathBuf;
use campusmap_core::engine::ReloadError;
use campusmap_data::LoadError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Errors emitted by the `campusmap` binary. Every variant exits with status 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option was present but unusable.
    #[error("invalid {field}: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The global log subscriber could not be installed.
    #[error("failed to initialise logging: {0}")]
    Logging(#[from] TryInitError),
    /// The async runtime could not be started.
    #[error("failed to start the runtime: {0}")]
    Runtime(#[source] io::Error),
    /// The dataset could not be loaded at startup.
    #[error("initial dataset load failed: {source}")]
    InitialLoad {
        #[source]
        source: ReloadError,
    },
    /// The startup load task panicked or was cancelled.
    #[error("initial dataset load did not complete: {0}")]
    LoadTask(#[source] tokio::task::JoinError),
    /// Loading an extract for inspection failed.
    #[error("failed to load extract: {0}")]
    Inspect(#[from] LoadError),
    /// Binding the listen address failed.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] io::Error),
    /// Serializing the inspection summary failed.
    #[error("failed to serialize summary: {0}")]
    SerializeSummary(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] io::Error),
}
