//! Loaded feature sets and the seam through which engines obtain them.

use std::sync::Arc;

use geo::Rect;
use thiserror::Error;

use crate::{Feature, FeatureId, Projection};

/// Immutable snapshot of every feature in an extract.
///
/// Features are sorted by ascending identifier and identifiers are unique.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    features: Vec<Arc<Feature>>,
    projection: Projection,
    bounds: Option<Rect<f64>>,
}

impl FeatureSet {
    /// Build a set from features already in plane coordinates.
    ///
    /// Duplicated identifiers keep the first occurrence.
    pub fn new(features: impl IntoIterator<Item = Feature>, projection: Projection) -> Self {
        let mut features: Vec<Arc<Feature>> = features.into_iter().map(Arc::new).collect();
        features.sort_by_key(|feature| feature.id);
        features.dedup_by_key(|feature| feature.id);
        let bounds = features
            .iter()
            .filter_map(|feature| feature.geometry.envelope())
            .reduce(merge_rects);
        Self {
            features,
            projection,
            bounds,
        }
    }

    /// Features in ascending identifier order.
    pub fn features(&self) -> &[Arc<Feature>] {
        &self.features
    }

    /// Projection that maps WGS84 into this set's plane.
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Plane-coordinate bounds covering every feature.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    /// Look up a feature by identifier.
    pub fn get(&self, id: FeatureId) -> Option<&Arc<Feature>> {
        self.features
            .binary_search_by_key(&id, |feature| feature.id)
            .ok()
            .and_then(|position| self.features.get(position))
    }

    /// Number of features in the set.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

pub(crate) fn merge_rects(left: Rect<f64>, right: Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::Coord {
            x: left.min().x.min(right.min().x),
            y: left.min().y.min(right.min().y),
        },
        geo::Coord {
            x: left.max().x.max(right.max().x),
            y: left.max().y.max(right.max().y),
        },
    )
}

/// Failure reported by a [`DatasetSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The extract could not be read.
    #[error("failed to read extract {location}: {source}")]
    Io {
        /// Human-readable location of the extract.
        location: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The extract was readable but malformed.
    #[error("failed to parse extract {location}: {message}")]
    Parse {
        /// Human-readable location of the extract.
        location: String,
        /// Decoder diagnostic.
        message: String,
    },
}

impl SourceError {
    /// Whether retrying the load may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Produces complete feature sets on demand.
///
/// Engines call [`DatasetSource::load`] on every reload; implementations must
/// return a complete set or an error, never a partial result.
pub trait DatasetSource: Send + Sync {
    /// Load the full extract.
    fn load(&self) -> Result<FeatureSet, SourceError>;

    /// Describe the source for logs and error messages.
    fn describe(&self) -> String;
}
