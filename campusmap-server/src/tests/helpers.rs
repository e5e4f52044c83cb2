//! Test helpers for serve datasets and layered overrides.

use super::*;
use crate::serve::{ServeArgs, ServeConfig};
use std::fs;
use tempfile::TempDir;

/// Two-feature Overpass extract: a cafe and the footway leading to it.
pub(super) const SMALL_EXTRACT: &str = r#"{
  "elements": [
    {"type": "node", "id": 1, "lat": 51.7600, "lon": -1.2600, "tags": {"amenity": "cafe", "name": "Hub"}},
    {"type": "node", "id": 2, "lat": 51.7610, "lon": -1.2600},
    {"type": "way", "id": 10, "nodes": [1, 2], "tags": {"highway": "footway"}}
  ]
}"#;

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) dataset: Option<Utf8PathBuf>,
    pub(super) cache_url: Option<String>,
}

#[derive(Debug)]
pub(super) struct DatasetFiles {
    _dir: TempDir,
    cli: Utf8PathBuf,
    config: Utf8PathBuf,
}

impl DatasetFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let cli = root.join("cli.json");
        let config = root.join("config.json");
        for path in [&cli, &config] {
            fs::write(path, SMALL_EXTRACT).expect("write extract");
        }
        Self {
            _dir: dir,
            cli,
            config,
        }
    }

    pub(super) fn cli(&self) -> &Utf8Path {
        &self.cli
    }

    pub(super) fn config(&self) -> &Utf8Path {
        &self.config
    }
}

pub(super) fn merge_layers(
    mut cli_args: ServeArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<ServeConfig, CliError> {
    merge_field(
        &mut cli_args.dataset,
        extract_field(&env_layer, |layer| &layer.dataset),
        extract_field(&file_layer, |layer| &layer.dataset),
    );
    merge_field(
        &mut cli_args.cache_url,
        extract_field(&env_layer, |layer| &layer.cache_url),
        extract_field(&file_layer, |layer| &layer.cache_url),
    );
    ServeConfig::try_from(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: &Option<LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.as_ref().and_then(|entry| accessor(entry).clone())
}
