//! Focused unit tests covering serve and inspect configuration.

use super::helpers::{DatasetFiles, SMALL_EXTRACT};
use super::*;
use crate::serve::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_URL, DEFAULT_MAX_EXPANSIONS, DEFAULT_PORT,
    DEFAULT_QUERY_TIMEOUT_MS, ServeArgs, ServeConfig, build_cache,
};
use campusmap_core::engine::{Generation, Query, QueryOutput};
use campusmap_core::cache::Fingerprint;
use rstest::rstest;
use std::{fs, net::SocketAddr, num::NonZeroUsize, sync::Arc, time::Duration};
use tempfile::TempDir;

fn serve_args(dataset: &str) -> ServeArgs {
    ServeArgs {
        dataset: Some(Utf8PathBuf::from(dataset)),
        ..ServeArgs::default()
    }
}

#[rstest]
fn serve_requires_a_dataset() {
    let err = ServeConfig::try_from(ServeArgs::default()).expect_err("missing dataset");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_DATASET);
            assert_eq!(env, ENV_SERVE_DATASET);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn inspect_requires_a_dataset() {
    let err = InspectConfig::try_from(InspectArgs::default()).expect_err("missing dataset");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_DATASET);
            assert_eq!(env, ENV_INSPECT_DATASET);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn serve_defaults_are_applied() {
    let config = ServeConfig::try_from(serve_args("campus.osm.pbf")).expect("config");
    assert_eq!(config.cache_url, DEFAULT_CACHE_URL);
    assert_eq!(config.cache_capacity.get(), DEFAULT_CACHE_CAPACITY);
    assert_eq!(config.listen, SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)));
    assert_eq!(config.projection, ProjectionMode::LocalMetres);
    assert_eq!(config.engine.limits.max_expansions, DEFAULT_MAX_EXPANSIONS);
    assert_eq!(
        config.engine.limits.timeout,
        Some(Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS))
    );
}

#[rstest]
fn serve_overrides_reach_the_engine() {
    let args = ServeArgs {
        snap_radius: Some(12.5),
        query_timeout_ms: Some(250),
        max_expansions: Some(10),
        planar: true,
        ..serve_args("campus.json")
    };
    let config = ServeConfig::try_from(args).expect("config");
    assert!((config.engine.snap_radius - 12.5).abs() < f64::EPSILON);
    assert_eq!(config.engine.limits.max_expansions, 10);
    assert_eq!(config.engine.limits.timeout, Some(Duration::from_millis(250)));
    assert_eq!(config.projection, ProjectionMode::Planar);
}

#[rstest]
#[case(ServeArgs { cache_capacity: Some(0), ..serve_args("a.json") }, ARG_CACHE_CAPACITY)]
#[case(ServeArgs { query_timeout_ms: Some(0), ..serve_args("a.json") }, ARG_QUERY_TIMEOUT_MS)]
#[case(ServeArgs { max_expansions: Some(0), ..serve_args("a.json") }, ARG_MAX_EXPANSIONS)]
#[case(ServeArgs { snap_radius: Some(-1.0), ..serve_args("a.json") }, ARG_SNAP_RADIUS)]
#[case(ServeArgs { snap_radius: Some(f64::NAN), ..serve_args("a.json") }, ARG_SNAP_RADIUS)]
fn serve_rejects_invalid_limits(#[case] args: ServeArgs, #[case] expected: &'static str) {
    match ServeConfig::try_from(args) {
        Err(CliError::InvalidArgument { field, .. }) => assert_eq!(field, expected),
        other => panic!("expected InvalidArgument, found {other:?}"),
    }
}

#[rstest]
#[case("memcached://localhost:11211")]
#[case("not a url")]
#[case("redis://:99999999")]
fn unusable_cache_urls_disable_caching(#[case] url: &str) {
    let cache = build_cache(url, NonZeroUsize::new(4).expect("non-zero"));
    let query = Query::Buildings {
        kind: "university".into(),
    };
    cache
        .put(
            Fingerprint::of(&query),
            Generation(1),
            Arc::new(QueryOutput::Buildings(Vec::new())),
        )
        .expect("put");
    assert_eq!(
        cache.get(&Fingerprint::of(&query), Generation(1)).expect("get"),
        None
    );
}

#[rstest]
fn require_existing_reports_missing_files() {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    match require_existing(&root.join("missing.osm.pbf"), ARG_DATASET) {
        Err(CliError::MissingSourceFile { field, .. }) => assert_eq!(field, ARG_DATASET),
        other => panic!("unexpected result {other:?}"),
    }
}

#[rstest]
fn require_existing_rejects_directories() {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    match require_existing(&root, ARG_DATASET) {
        Err(CliError::SourcePathNotFile { field, .. }) => assert_eq!(field, ARG_DATASET),
        other => panic!("unexpected result {other:?}"),
    }
}

#[rstest]
fn inspect_prints_the_load_summary() {
    let files = DatasetFiles::new();
    let config = InspectConfig {
        dataset: files.cli().to_path_buf(),
        projection: ProjectionMode::LocalMetres,
    };
    let mut out = Vec::new();
    run_inspect(&config, &mut out).expect("inspect");
    let report: serde_json::Value = serde_json::from_slice(&out).expect("json report");
    assert_eq!(report["dataset"], files.cli().as_str());
    assert_eq!(report["nodes"], 2);
    assert_eq!(report["ways"], 1);
    assert_eq!(report["relations"], 0);
    assert_eq!(report["features"], 2);
    assert_eq!(report["skipped"], 0);
    let bounds = report["bounds"].as_array().expect("bounds");
    assert_eq!(bounds.len(), 4);
}

#[rstest]
fn inspect_surfaces_parse_failures() {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    let path = root.join("broken.json");
    fs::write(&path, &SMALL_EXTRACT[..20]).expect("write truncated extract");
    let config = InspectConfig {
        dataset: path,
        projection: ProjectionMode::Planar,
    };
    let err = run_inspect(&config, &mut Vec::new()).expect_err("truncated extract");
    assert!(matches!(err, CliError::Inspect(_)), "unexpected error {err:?}");
}
