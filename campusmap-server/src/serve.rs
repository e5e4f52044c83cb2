//! `serve` command: configuration, startup load and the HTTP listener.

use std::{net::SocketAddr, num::NonZeroUsize, sync::Arc, time::Duration};

use camino::Utf8PathBuf;
use campusmap_core::{
    DatasetSource, ProjectionMode, SearchLimits,
    cache::{CacheBackend, CachedEngine, NoopCache, QueryCache},
    engine::{EngineConfig, QueryEngine, RetryPolicy},
};
use campusmap_data::{ExtractSource, LoadOptions};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    ARG_CACHE_CAPACITY, ARG_CACHE_URL, ARG_DATASET, ARG_LISTEN, ARG_MAX_EXPANSIONS,
    ARG_QUERY_TIMEOUT_MS, ARG_SNAP_RADIUS, CliError, ENV_SERVE_DATASET,
    http::{self, AppState},
    projection_mode, require_existing,
};

pub(crate) const DEFAULT_CACHE_URL: &str = "memory://";
pub(crate) const DEFAULT_CACHE_CAPACITY: usize = 1024;
pub(crate) const DEFAULT_QUERY_TIMEOUT_MS: u64 = 2_000;
pub(crate) const DEFAULT_MAX_EXPANSIONS: usize = 200_000;
pub(crate) const DEFAULT_PORT: u16 = 5000;

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load a campus extract and answer nearest, bounding-box, \
                 routing and room queries over HTTP. Options can come from \
                 CLI flags, configuration files, or environment variables.",
    about = "Serve campus queries over HTTP"
)]
#[ortho_config(prefix = "CAMPUSMAP")]
pub(crate) struct ServeArgs {
    /// Path to the OSM PBF or Overpass JSON extract.
    #[arg(long = ARG_DATASET, value_name = "path")]
    #[serde(default)]
    pub(crate) dataset: Option<Utf8PathBuf>,
    /// Cache backend URL: `memory://`, `redis://host[:port][/db]` or `none://`,
    /// each optionally followed by `?ttl_secs=N`.
    #[arg(long = ARG_CACHE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) cache_url: Option<String>,
    /// Maximum number of cached results.
    #[arg(long = ARG_CACHE_CAPACITY, value_name = "entries")]
    #[serde(default)]
    pub(crate) cache_capacity: Option<usize>,
    /// Greatest distance at which a route endpoint snaps onto a path.
    #[arg(long = ARG_SNAP_RADIUS, value_name = "metres")]
    #[serde(default)]
    pub(crate) snap_radius: Option<f64>,
    /// Wall-clock budget per query.
    #[arg(long = ARG_QUERY_TIMEOUT_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) query_timeout_ms: Option<u64>,
    /// Expansion budget per query.
    #[arg(long = ARG_MAX_EXPANSIONS, value_name = "count")]
    #[serde(default)]
    pub(crate) max_expansions: Option<usize>,
    /// Address to listen on.
    #[arg(long = ARG_LISTEN, value_name = "addr")]
    #[serde(default)]
    pub(crate) listen: Option<SocketAddr>,
    /// Keep input coordinates instead of projecting to metres.
    #[arg(long)]
    #[serde(default)]
    pub(crate) planar: bool,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServeConfig {
    pub(crate) dataset: Utf8PathBuf,
    pub(crate) cache_url: String,
    pub(crate) cache_capacity: NonZeroUsize,
    pub(crate) engine: EngineConfig,
    pub(crate) listen: SocketAddr,
    pub(crate) projection: ProjectionMode,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let dataset = args.dataset.ok_or(CliError::MissingArgument {
            field: ARG_DATASET,
            env: ENV_SERVE_DATASET,
        })?;

        let capacity = args.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
        let cache_capacity = NonZeroUsize::new(capacity).ok_or(CliError::InvalidArgument {
            field: ARG_CACHE_CAPACITY,
            message: "must be at least 1".to_owned(),
        })?;

        let mut engine = EngineConfig::default();
        if let Some(snap_radius) = args.snap_radius {
            if !snap_radius.is_finite() || snap_radius <= 0.0 {
                return Err(CliError::InvalidArgument {
                    field: ARG_SNAP_RADIUS,
                    message: format!("must be a positive distance, got {snap_radius}"),
                });
            }
            engine.snap_radius = snap_radius;
        }
        let timeout_ms = args.query_timeout_ms.unwrap_or(DEFAULT_QUERY_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(CliError::InvalidArgument {
                field: ARG_QUERY_TIMEOUT_MS,
                message: "must be at least 1".to_owned(),
            });
        }
        let max_expansions = args.max_expansions.unwrap_or(DEFAULT_MAX_EXPANSIONS);
        if max_expansions == 0 {
            return Err(CliError::InvalidArgument {
                field: ARG_MAX_EXPANSIONS,
                message: "must be at least 1".to_owned(),
            });
        }
        engine.limits = SearchLimits {
            max_expansions,
            timeout: Some(Duration::from_millis(timeout_ms)),
        };

        Ok(Self {
            dataset,
            cache_url: args
                .cache_url
                .unwrap_or_else(|| DEFAULT_CACHE_URL.to_owned()),
            cache_capacity,
            engine,
            listen: args
                .listen
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))),
            projection: projection_mode(args.planar),
        })
    }
}

/// Select the configured cache backend, degrading to no caching when the
/// URL is unusable.
pub(crate) fn build_cache(url: &str, capacity: NonZeroUsize) -> Arc<dyn QueryCache> {
    CacheBackend::from_url(url)
        .and_then(|backend| backend.build(capacity))
        .unwrap_or_else(|err| {
            warn!(%err, "caching disabled");
            Arc::new(NoopCache)
        })
}

pub(crate) fn run_serve(config: ServeConfig) -> Result<(), CliError> {
    require_existing(&config.dataset, ARG_DATASET)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(serve(config))
}

async fn serve(config: ServeConfig) -> Result<(), CliError> {
    let engine = Arc::new(QueryEngine::new(config.engine));
    let source: Arc<dyn DatasetSource> = Arc::new(ExtractSource::new(
        config.dataset.clone(),
        LoadOptions {
            projection: config.projection,
        },
    ));

    let loader = Arc::clone(&engine);
    let initial = Arc::clone(&source);
    let generation = tokio::task::spawn_blocking(move || loader.reload(initial.as_ref()))
        .await
        .map_err(CliError::LoadTask)?
        .map_err(|source| CliError::InitialLoad { source })?;
    info!(%generation, dataset = %config.dataset, "dataset ready");

    let cache = build_cache(&config.cache_url, config.cache_capacity);
    let state = Arc::new(AppState::new(
        CachedEngine::new(engine, cache),
        source,
        RetryPolicy::default(),
    ));

    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|source| CliError::Bind {
            addr: config.listen,
            source,
        })?;
    info!(addr = %config.listen, "listening");
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve)?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
}
