//! Derive a [`Graph`] from the traversable features of a [`FeatureSet`].

use std::collections::HashMap;

use geo::{Coord, LineString};
use log::{debug, warn};
use thiserror::Error;

use super::{Edge, Graph, NodeId};
use crate::{Feature, FeatureId, FeatureSet, Geometry, feature::coord_distance};

/// `highway` values pedestrians may use.
const WALKABLE_HIGHWAYS: &[&str] = &[
    "bridleway",
    "corridor",
    "cycleway",
    "footway",
    "living_street",
    "path",
    "pedestrian",
    "primary",
    "residential",
    "road",
    "secondary",
    "service",
    "steps",
    "tertiary",
    "track",
    "unclassified",
];

/// Errors raised while deriving a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A segment of `way` produced a non-finite or negative weight.
    #[error("way {way} produced an invalid edge weight")]
    InvalidWeight {
        /// Feature the segment belongs to.
        way: FeatureId,
    },
    /// The configuration itself is unusable.
    #[error("invalid graph configuration: {message}")]
    InvalidConfig {
        /// Explanation of the problem.
        message: String,
    },
}

/// Cost model and merge behaviour for graph derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphConfig {
    /// Distance under which two vertices become one node. `None` uses the
    /// projection default.
    pub merge_tolerance: Option<f64>,
    /// Multiplier applied to `highway=steps`.
    pub steps_factor: f64,
    /// Multiplier applied to `wheelchair=no`.
    pub inaccessible_factor: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            merge_tolerance: None,
            steps_factor: 2.0,
            inaccessible_factor: 1.0,
        }
    }
}

/// Whether pedestrians may walk along `feature`.
///
/// # Examples
/// ```
/// use geo::LineString;
/// use campusmap_core::{Feature, FeatureId, Geometry, Tags, graph::is_traversable};
///
/// let path = Feature::new(
///     FeatureId(1),
///     Geometry::Polyline(LineString::from(vec![(0.0, 0.0), (1.0, 0.0)])),
///     Tags::from([("highway".into(), "footway".into())]),
/// );
/// assert!(is_traversable(&path));
/// ```
pub fn is_traversable(feature: &Feature) -> bool {
    if matches!(feature.geometry, Geometry::Point(_)) {
        return false;
    }
    let walkable = feature
        .tag("highway")
        .is_some_and(|highway| WALKABLE_HIGHWAYS.contains(&highway))
        || feature.tag("indoor") == Some("corridor");
    let excluded = matches!(feature.tag("access"), Some("no" | "private"))
        || feature.tag("foot") == Some("no")
        || feature.tag("area") == Some("yes");
    walkable && !excluded
}

/// Builds graphs under one [`GraphConfig`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: GraphConfig,
}

impl GraphBuilder {
    /// Create a builder with `config`.
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Derive the routing graph for `set`.
    ///
    /// Features are visited in ascending id order, so node numbering is
    /// deterministic for a given extract.
    pub fn build(&self, set: &FeatureSet) -> Result<Graph, GraphError> {
        let tolerance = self
            .config
            .merge_tolerance
            .unwrap_or_else(|| set.projection().merge_tolerance());
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(GraphError::InvalidConfig {
                message: format!("merge tolerance must be positive, got {tolerance}"),
            });
        }
        let mut nodes = NodeArena::new(tolerance);
        let mut edges = Vec::new();
        let mut min_factor = f64::INFINITY;
        let mut dropped = 0_usize;

        for feature in set.features().iter().filter(|feature| is_traversable(feature)) {
            let factor = self.cost_factor(feature);
            if !factor.is_finite() || factor <= 0.0 {
                return Err(GraphError::InvalidWeight { way: feature.id });
            }
            for line in walkable_lines(&feature.geometry) {
                for segment in line.lines() {
                    if coord_distance(segment.start, segment.end) <= tolerance {
                        dropped += 1;
                        continue;
                    }
                    let from = nodes.intern(segment.start);
                    let to = nodes.intern(segment.end);
                    if from == to {
                        dropped += 1;
                        continue;
                    }
                    let length = coord_distance(nodes.coord(from), nodes.coord(to));
                    let weight = length * factor;
                    if !weight.is_finite() || weight < 0.0 {
                        return Err(GraphError::InvalidWeight { way: feature.id });
                    }
                    min_factor = min_factor.min(factor);
                    edges.push(Edge {
                        from,
                        to,
                        weight,
                        way: feature.id,
                    });
                }
            }
        }

        if dropped > 0 {
            debug!("dropped {dropped} zero-length segments");
        }
        let min_factor = if min_factor.is_finite() { min_factor } else { 1.0 };
        let graph = Graph::from_parts(nodes.into_coords(), edges, min_factor);
        debug!(
            "built routing graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        if let Some(warning) = graph.connectivity_warning() {
            warn!("{warning}");
        }
        Ok(graph)
    }

    fn cost_factor(&self, feature: &Feature) -> f64 {
        if let Some(cost) = feature
            .tag("traversal_cost")
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|cost| cost.is_finite() && *cost > 0.0)
        {
            return cost;
        }
        let mut factor = 1.0;
        if feature.tag("highway") == Some("steps") {
            factor *= self.config.steps_factor;
        }
        if feature.tag("wheelchair") == Some("no") {
            factor *= self.config.inaccessible_factor;
        }
        factor
    }
}

fn walkable_lines(geometry: &Geometry) -> Vec<&LineString<f64>> {
    match geometry {
        Geometry::Point(_) => Vec::new(),
        Geometry::Polyline(line) => vec![line],
        Geometry::Polygon(polygon) => std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .collect(),
    }
}

/// Node storage with tolerance-based vertex merging over a hashed grid.
struct NodeArena {
    tolerance: f64,
    coords: Vec<Coord<f64>>,
    grid: HashMap<(i64, i64), Vec<NodeId>>,
}

impl NodeArena {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            coords: Vec::new(),
            grid: HashMap::new(),
        }
    }

    // `as` saturates, so coordinates far outside a campus share edge cells.
    fn cell(&self, coord: Coord<f64>) -> (i64, i64) {
        (
            (coord.x / self.tolerance).floor() as i64,
            (coord.y / self.tolerance).floor() as i64,
        )
    }

    fn coord(&self, node: NodeId) -> Coord<f64> {
        self.coords
            .get(node.index())
            .copied()
            .unwrap_or(Coord { x: f64::NAN, y: f64::NAN })
    }

    fn intern(&mut self, coord: Coord<f64>) -> NodeId {
        let (cx, cy) = self.cell(coord);
        let existing = (cx.saturating_sub(1)..=cx.saturating_add(1))
            .flat_map(|x| (cy.saturating_sub(1)..=cy.saturating_add(1)).map(move |y| (x, y)))
            .filter_map(|cell| self.grid.get(&cell))
            .flatten()
            .copied()
            .filter(|node| coord_distance(self.coord(*node), coord) <= self.tolerance)
            .min();
        if let Some(node) = existing {
            return node;
        }
        let node = NodeId(u32::try_from(self.coords.len()).unwrap_or(u32::MAX));
        self.coords.push(coord);
        self.grid.entry((cx, cy)).or_default().push(node);
        node
    }

    fn into_coords(self) -> Vec<Coord<f64>> {
        self.coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Projection, Tags};
    use geo::polygon;
    use rstest::rstest;

    fn way(id: u64, coords: Vec<(f64, f64)>, tags: &[(&str, &str)]) -> Feature {
        Feature::new(
            FeatureId(id),
            Geometry::Polyline(LineString::from(coords)),
            tags.iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect::<Tags>(),
        )
    }

    fn build(features: Vec<Feature>) -> Graph {
        GraphBuilder::default()
            .build(&FeatureSet::new(features, Projection::Planar))
            .expect("graph")
    }

    #[rstest]
    #[case(&[("highway", "footway")], true)]
    #[case(&[("highway", "motorway")], false)]
    #[case(&[("indoor", "corridor")], true)]
    #[case(&[("highway", "footway"), ("access", "private")], false)]
    #[case(&[("highway", "path"), ("foot", "no")], false)]
    #[case(&[("highway", "pedestrian"), ("area", "yes")], false)]
    #[case(&[("building", "yes")], false)]
    fn traversability_rules(#[case] tags: &[(&str, &str)], #[case] expected: bool) {
        let feature = way(1, vec![(0.0, 0.0), (1.0, 0.0)], tags);
        assert_eq!(is_traversable(&feature), expected);
    }

    #[rstest]
    fn shared_vertices_become_junctions() {
        let graph = build(vec![
            way(1, vec![(0.0, 0.0), (0.0, 10.0)], &[("highway", "footway")]),
            way(2, vec![(0.0, 10.0), (10.0, 10.0)], &[("highway", "footway")]),
        ]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.component_count(), 1);
    }

    #[rstest]
    fn near_coincident_vertices_merge_within_tolerance() {
        let graph = GraphBuilder::new(GraphConfig {
            merge_tolerance: Some(0.01),
            ..GraphConfig::default()
        })
        .build(&FeatureSet::new(
            vec![
                way(1, vec![(0.0, 0.0), (5.0, 0.0)], &[("highway", "path")]),
                way(2, vec![(5.004, 0.0), (5.0, 5.0)], &[("highway", "path")]),
            ],
            Projection::Planar,
        ))
        .expect("graph");
        assert_eq!(graph.node_count(), 3);
    }

    #[rstest]
    fn zero_length_segments_are_dropped() {
        let graph = build(vec![way(
            1,
            vec![(0.0, 0.0), (0.0, 0.0), (3.0, 4.0)],
            &[("highway", "footway")],
        )]);
        assert_eq!(graph.edge_count(), 1);
        assert!((graph.edges()[0].weight - 5.0).abs() < 1e-12);
    }

    #[rstest]
    #[case(&[("highway", "steps")], 20.0)]
    #[case(&[("highway", "footway"), ("traversal_cost", "3.5")], 35.0)]
    #[case(&[("highway", "steps"), ("traversal_cost", "-1")], 20.0)]
    fn cost_model_scales_length(#[case] tags: &[(&str, &str)], #[case] expected: f64) {
        let graph = build(vec![way(1, vec![(0.0, 0.0), (10.0, 0.0)], tags)]);
        assert!((graph.edges()[0].weight - expected).abs() < 1e-12);
    }

    #[rstest]
    fn traversable_polygons_contribute_their_boundary() {
        let plaza = Feature::new(
            FeatureId(7),
            Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 4.0, y: 0.0),
                (x: 4.0, y: 4.0),
                (x: 0.0, y: 4.0),
            ]),
            Tags::from([("highway".into(), "pedestrian".into())]),
        );
        let graph = build(vec![plaza]);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
    }

    #[rstest]
    fn non_finite_cost_factor_is_rejected() {
        let err = GraphBuilder::new(GraphConfig {
            steps_factor: f64::INFINITY,
            ..GraphConfig::default()
        })
        .build(&FeatureSet::new(
            vec![way(4, vec![(0.0, 0.0), (1.0, 0.0)], &[("highway", "steps")])],
            Projection::Planar,
        ))
        .expect_err("invalid weight");
        assert_eq!(err, GraphError::InvalidWeight { way: FeatureId(4) });
    }

    #[rstest]
    fn disconnected_ways_form_separate_components() {
        let graph = build(vec![
            way(1, vec![(0.0, 0.0), (1.0, 0.0)], &[("highway", "footway")]),
            way(2, vec![(50.0, 0.0), (51.0, 0.0)], &[("highway", "footway")]),
        ]);
        assert_eq!(graph.component_count(), 2);
    }

    #[rstest]
    fn crossing_ways_without_a_shared_vertex_stay_apart() {
        let graph = build(vec![
            way(1, vec![(0.0, 5.0), (10.0, 5.0)], &[("highway", "footway")]),
            way(2, vec![(5.0, 0.0), (5.0, 10.0)], &[("highway", "footway")]),
        ]);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.component_count(), 2);
    }
}
