//! Spatial index over loaded features.
//!
//! The index is an R\*-tree bulk-loaded once per dataset generation. Entries
//! hold shared handles to the features owned by the [`FeatureSet`]; the tree
//! is never mutated after construction.
//!
//! [`FeatureSet`]: crate::FeatureSet

use std::{fmt, sync::Arc};

use geo::{Coord, Rect};
use rstar::{AABB, RTree};
use thiserror::Error;

use crate::{Feature, FeatureId, QueryError, SearchBudget, TagFilter};

mod entry;

use entry::IndexedFeature;

/// Errors raised while building a [`SpatialIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// A feature had no coordinates or a non-finite coordinate.
    #[error("feature {id} has invalid geometry")]
    InvalidGeometry {
        /// Identifier of the offending feature.
        id: FeatureId,
    },
}

/// A feature returned by a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NearestHit {
    /// The matching feature.
    pub feature: Arc<Feature>,
    /// Euclidean plane distance from the query point to the geometry.
    pub distance: f64,
}

/// Query-efficient index answering nearest and bounding-box queries.
pub struct SpatialIndex {
    tree: RTree<IndexedFeature>,
}

impl fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("entries", &self.tree.size())
            .finish_non_exhaustive()
    }
}

impl SpatialIndex {
    /// Bulk-load an index over `features`.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use geo::Coord;
    /// use campusmap_core::{Feature, FeatureId, Geometry, SpatialIndex, Tags};
    ///
    /// let feature = Feature::new(FeatureId(1), Geometry::Point(Coord { x: 0.0, y: 0.0 }), Tags::new());
    /// let index = SpatialIndex::build(&[Arc::new(feature)])?;
    /// assert_eq!(index.len(), 1);
    /// # Ok::<(), campusmap_core::IndexError>(())
    /// ```
    pub fn build(features: &[Arc<Feature>]) -> Result<Self, IndexError> {
        let entries = features
            .iter()
            .map(|feature| {
                IndexedFeature::new(Arc::clone(feature))
                    .ok_or(IndexError::InvalidGeometry { id: feature.id })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            tree: RTree::bulk_load(entries),
        })
    }

    /// Number of indexed features.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no features.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Return the `k` features closest to `point` that satisfy `filter`.
    ///
    /// Results are ordered by ascending distance; equal distances are ordered
    /// by ascending feature identifier. The R\*-tree yields candidates in
    /// distance order, so traversal stops as soon as the next candidate is
    /// farther than the `k`-th match.
    pub fn nearest(
        &self,
        point: Coord<f64>,
        k: usize,
        filter: &TagFilter,
        budget: &mut SearchBudget,
    ) -> Result<Vec<NearestHit>, QueryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut matches: Vec<(f64, &Arc<Feature>)> = Vec::with_capacity(k);
        for (entry, distance_2) in self.tree.nearest_neighbor_iter_with_distance_2(&[point.x, point.y]) {
            budget.tick()?;
            if matches.len() >= k
                && let Some((farthest, _)) = matches.last()
                && distance_2 > *farthest
            {
                break;
            }
            if filter.matches(&entry.feature.tags) {
                matches.push((distance_2, &entry.feature));
            }
        }
        matches.sort_by(|(left_d, left), (right_d, right)| {
            left_d.total_cmp(right_d).then_with(|| left.id.cmp(&right.id))
        });
        matches.truncate(k);
        Ok(matches
            .into_iter()
            .map(|(distance_2, feature)| NearestHit {
                feature: Arc::clone(feature),
                distance: distance_2.sqrt(),
            })
            .collect())
    }

    /// Return every feature whose geometry intersects `bbox` and satisfies
    /// `filter`, ordered by ascending identifier. Boundary contact counts.
    pub fn within(&self, bbox: &Rect<f64>, filter: &TagFilter) -> Vec<Arc<Feature>> {
        let envelope =
            AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        let mut found: Vec<Arc<Feature>> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| entry.feature.geometry.intersects_rect(bbox))
            .filter(|entry| filter.matches(&entry.feature.tags))
            .map(|entry| Arc::clone(&entry.feature))
            .collect();
        found.sort_unstable_by_key(|feature| feature.id);
        found
    }

    /// Iterate over every indexed feature in tree order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Feature>> {
        self.tree.iter().map(|entry| &entry.feature)
    }
}
