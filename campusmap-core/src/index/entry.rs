//! R\*-tree entries wrapping shared features.

use std::sync::Arc;

use geo::Coord;
use rstar::{AABB, PointDistance, RTreeObject};

use crate::Feature;

/// Feature handle stored in the R\*-tree together with its cached envelope.
#[derive(Debug, Clone)]
pub(crate) struct IndexedFeature {
    pub(crate) feature: Arc<Feature>,
    envelope: AABB<[f64; 2]>,
}

impl IndexedFeature {
    /// Wrap `feature`, returning `None` when its geometry has no finite bounds.
    pub(crate) fn new(feature: Arc<Feature>) -> Option<Self> {
        if !feature.geometry.is_finite() {
            return None;
        }
        let rect = feature.geometry.envelope()?;
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        Some(Self { feature, envelope })
    }
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedFeature {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let [x, y] = *point;
        let distance = self.feature.geometry.distance_to(Coord { x, y });
        distance * distance
    }
}
