use std::io::{self, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use campusmap_core::{DatasetSource, FeatureSet, ProjectionMode, SourceError};
use cap_std::{ambient_authority, fs_utf8};
use geo::{Coord, Rect};
use log::info;
use thiserror::Error;

mod accumulator;
mod ids;
mod overpass;
mod pbf;
mod rings;
mod tags;

pub use ids::decode_feature_id;

/// Summary of raw OSM elements discovered while loading an extract.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadSummary {
    /// Number of nodes discovered, including dense-node entries.
    pub nodes: u64,
    /// Number of ways discovered.
    pub ways: u64,
    /// Number of relations discovered.
    pub relations: u64,
    /// Number of features produced.
    pub features: u64,
    /// Tagged ways and relations whose geometry could not be resolved.
    pub skipped: u64,
    /// Bounding box covering all node coordinates, if any nodes were present.
    /// Coordinates are WGS84 with `x = longitude`, `y = latitude`.
    pub bounds: Option<Rect<f64>>,
}

impl LoadSummary {
    fn combine(mut self, other: Self) -> Self {
        self.nodes += other.nodes;
        self.ways += other.ways;
        self.relations += other.relations;
        self.features += other.features;
        self.skipped += other.skipped;
        if let Some(bounds) = other.bounds {
            self.include_bounds(bounds);
        }
        self
    }

    fn include_bounds(&mut self, bounds: Rect<f64>) {
        match &mut self.bounds {
            Some(existing) => {
                let min = Coord {
                    x: existing.min().x.min(bounds.min().x),
                    y: existing.min().y.min(bounds.min().y),
                };
                let max = Coord {
                    x: existing.max().x.max(bounds.max().x),
                    y: existing.max().y.max(bounds.max().y),
                };
                *existing = Rect::new(min, max);
            }
            None => self.bounds = Some(bounds),
        }
    }

    fn record_node(&mut self, lon: f64, lat: f64) {
        self.nodes += 1;
        if lon.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat)
        {
            let coordinate = Coord { x: lon, y: lat };
            self.include_bounds(Rect::new(coordinate, coordinate));
        }
    }

    fn record_way(&mut self) {
        self.ways += 1;
    }

    fn record_relation(&mut self) {
        self.relations += 1;
    }
}

/// A loaded extract together with its summary.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Element counts and bounds.
    pub summary: LoadSummary,
    /// Projected features.
    pub features: FeatureSet,
}

/// Encodings understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractFormat {
    /// OSM PBF (`.pbf`, `.osm.pbf`).
    Pbf,
    /// Overpass API JSON (`.json`).
    OverpassJson,
}

impl ExtractFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "pbf" => Some(Self::Pbf),
            "json" => Some(Self::OverpassJson),
            _ => None,
        }
    }
}

/// Options applied while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// How WGS84 input is mapped into plane coordinates.
    pub projection: ProjectionMode,
}

/// Errors returned when loading an extract.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read extract at {path}")]
    Io {
        #[source]
        source: io::Error,
        path: Utf8PathBuf,
    },
    #[error("failed to decode extract at {path}: {message}")]
    Parse { message: String, path: Utf8PathBuf },
    #[error("extract at {path} contains no usable features")]
    Empty { path: Utf8PathBuf },
}

impl From<LoadError> for SourceError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io { source, path } => Self::Io {
                location: path.into_string(),
                source,
            },
            LoadError::Parse { message, path } => Self::Parse {
                location: path.into_string(),
                message,
            },
            LoadError::Empty { path } => Self::Parse {
                location: path.into_string(),
                message: "no usable features".to_owned(),
            },
        }
    }
}

/// Load an extract into a [`FeatureSet`].
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use campusmap_data::{LoadOptions, load_extract};
///
/// # fn main() -> Result<(), campusmap_data::LoadError> {
/// let features = load_extract(Utf8Path::new("campus.osm.pbf"), &LoadOptions::default())?;
/// println!("Loaded {} features", features.len());
/// # Ok(())
/// # }
/// ```
pub fn load_extract(path: &Utf8Path, options: &LoadOptions) -> Result<FeatureSet, LoadError> {
    load_extract_report(path, options).map(|report| report.features)
}

/// Load an extract, producing both the features and element counts.
///
/// The format is chosen from the file extension; anything other than
/// `.json` is decoded as PBF.
pub fn load_extract_report(path: &Utf8Path, options: &LoadOptions) -> Result<LoadReport, LoadError> {
    let file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(|source| {
        LoadError::Io {
            source,
            path: path.to_path_buf(),
        }
    })?;
    let reader = BufReader::new(file);
    let accumulator = match ExtractFormat::from_path(path).unwrap_or(ExtractFormat::Pbf) {
        ExtractFormat::Pbf => pbf::read(reader),
        ExtractFormat::OverpassJson => overpass::read(reader),
    }
    .map_err(|message| LoadError::Parse {
        message,
        path: path.to_path_buf(),
    })?;

    let (features, projection, summary) = accumulator.finish(options.projection);
    if features.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    info!(
        "loaded {path}: {} nodes, {} ways, {} relations -> {} features ({} skipped)",
        summary.nodes, summary.ways, summary.relations, summary.features, summary.skipped
    );
    Ok(LoadReport {
        summary,
        features: FeatureSet::new(features, projection),
    })
}

/// A [`DatasetSource`] reading an extract file on every load.
#[derive(Debug, Clone)]
pub struct ExtractSource {
    path: Utf8PathBuf,
    options: LoadOptions,
}

impl ExtractSource {
    /// Read `path` with `options` on each load.
    pub fn new(path: impl Into<Utf8PathBuf>, options: LoadOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// The extract path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl DatasetSource for ExtractSource {
    fn load(&self) -> Result<FeatureSet, SourceError> {
        load_extract(&self.path, &self.options).map_err(SourceError::from)
    }

    fn describe(&self) -> String {
        self.path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("campus.osm.pbf", Some(ExtractFormat::Pbf))]
    #[case("campus.JSON", Some(ExtractFormat::OverpassJson))]
    #[case("campus.osm", None)]
    #[case("campus", None)]
    fn format_follows_extension(#[case] path: &str, #[case] expected: Option<ExtractFormat>) {
        assert_eq!(ExtractFormat::from_path(Utf8Path::new(path)), expected);
    }

    #[rstest]
    fn empty_extract_is_a_parse_failure() {
        let err = SourceError::from(LoadError::Empty {
            path: "empty.json".into(),
        });
        assert!(matches!(err, SourceError::Parse { ref location, .. } if location == "empty.json"));
        assert!(!err.is_transient());
    }

    #[rstest]
    fn io_failures_stay_transient() {
        let err = SourceError::from(LoadError::Io {
            source: io::Error::from(io::ErrorKind::NotFound),
            path: "missing.pbf".into(),
        });
        assert!(err.is_transient());
    }
}
