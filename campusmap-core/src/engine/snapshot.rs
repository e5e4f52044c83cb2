//! One immutable dataset generation.

use std::sync::Arc;

use geo::{Coord, Rect};

use super::{EngineConfig, Generation, Query, QueryOutput};
use crate::{
    Endpoint, Feature, FeatureSet, NearestHit, Projection, QueryError, SearchBudget, SpatialIndex,
    TagFilter,
    graph::{Graph, NodeId},
    routing::{RoutePlan, shortest_path},
};

/// Features, index and graph bound to one generation.
///
/// A snapshot is never modified after publication; queries holding an
/// `Arc<Snapshot>` keep using it even after a newer generation replaces it.
#[derive(Debug)]
pub struct Snapshot {
    pub(super) generation: Generation,
    pub(super) features: FeatureSet,
    pub(super) index: SpatialIndex,
    pub(super) graph: Graph,
}

impl Snapshot {
    /// Generation this snapshot was published as.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Every feature of the generation.
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// The spatial index.
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// The routing graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Projection mapping WGS84 into this snapshot's plane.
    pub fn projection(&self) -> Projection {
        self.features.projection()
    }

    /// The `k` features closest to `point` that match `filter`.
    ///
    /// `k` is clamped to `max_k`; `k = 0` yields no hits.
    pub fn nearest(
        &self,
        point: Coord<f64>,
        k: usize,
        filter: &TagFilter,
        max_k: usize,
        budget: &mut SearchBudget,
    ) -> Result<Vec<NearestHit>, QueryError> {
        ensure_finite(point)?;
        self.index.nearest(point, k.min(max_k), filter, budget)
    }

    /// Features intersecting `bbox` that match `filter`, in ascending id order.
    pub fn within(&self, bbox: &Rect<f64>, filter: &TagFilter) -> Result<Vec<Arc<Feature>>, QueryError> {
        ensure_finite(bbox.min())?;
        ensure_finite(bbox.max())?;
        Ok(self.index.within(bbox, filter))
    }

    /// Cheapest walking route between the graph nodes nearest to `from` and `to`.
    pub fn route(
        &self,
        from: Coord<f64>,
        to: Coord<f64>,
        snap_radius: f64,
        budget: &mut SearchBudget,
    ) -> Result<RoutePlan, QueryError> {
        ensure_finite(from)?;
        ensure_finite(to)?;
        let start = self.snap(from, Endpoint::From, snap_radius)?;
        let goal = self.snap(to, Endpoint::To, snap_radius)?;
        shortest_path(&self.graph, start, goal, budget)
    }

    fn snap(
        &self,
        point: Coord<f64>,
        endpoint: Endpoint,
        snap_radius: f64,
    ) -> Result<NodeId, QueryError> {
        match self.graph.nearest_node(point) {
            Some((node, distance)) if distance <= snap_radius => Ok(node),
            Some((_, distance)) => Err(QueryError::UnreachablePoint {
                endpoint,
                distance,
                snap_radius,
            }),
            None => Err(QueryError::UnreachablePoint {
                endpoint,
                distance: f64::INFINITY,
                snap_radius,
            }),
        }
    }

    /// Run `query` against this snapshot.
    pub fn execute(
        &self,
        query: &Query,
        config: &EngineConfig,
        budget: &mut SearchBudget,
    ) -> Result<QueryOutput, QueryError> {
        match query {
            Query::Nearest { point, k, filter } => self
                .nearest(*point, *k, filter, config.max_k, budget)
                .map(QueryOutput::Nearest),
            Query::Route { from, to } => self
                .route(*from, *to, config.snap_radius, budget)
                .map(QueryOutput::Route),
            Query::Within { bbox, filter } => self.within(bbox, filter).map(QueryOutput::Features),
            Query::FindRoom { building, room } => self
                .find_room(building, room, budget)
                .map(QueryOutput::Room),
            Query::Buildings { kind } => Ok(QueryOutput::Buildings(self.buildings(kind))),
        }
    }
}

fn ensure_finite(point: Coord<f64>) -> Result<(), QueryError> {
    if point.x.is_finite() && point.y.is_finite() {
        Ok(())
    } else {
        Err(QueryError::InvalidArgument {
            message: "coordinates must be finite".to_owned(),
        })
    }
}
