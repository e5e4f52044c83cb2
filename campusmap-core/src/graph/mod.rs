//! Routable pedestrian graph derived from traversable features.
//!
//! Nodes live in an arena indexed by [`NodeId`]; edges reference nodes by
//! index, so loops and junctions never form reference cycles. The graph is
//! rebuilt wholesale for every dataset generation.

use std::fmt;

use geo::Coord;
use rstar::{RTree, primitives::GeomWithData};

use crate::FeatureId;

mod builder;
mod components;

pub use builder::{GraphBuilder, GraphConfig, GraphError, is_traversable};

/// Index of a node within one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An undirected walkable segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// First endpoint.
    pub from: NodeId,
    /// Second endpoint.
    pub to: NodeId,
    /// Non-negative traversal cost: plane length scaled by the cost model.
    pub weight: f64,
    /// Feature the segment was derived from.
    pub way: FeatureId,
}

/// Non-fatal report that the graph is split into several components.
///
/// Routes between different components fail with
/// [`QueryError::NoPath`](crate::QueryError::NoPath).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectedGraphWarning {
    /// Number of connected components.
    pub components: usize,
    /// Node count of the largest component.
    pub largest: usize,
    /// Total node count.
    pub nodes: usize,
}

impl fmt::Display for DisconnectedGraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "routing graph has {} disconnected components; the largest holds {} of {} nodes",
            self.components, self.largest, self.nodes
        )
    }
}

type NodePoint = GeomWithData<[f64; 2], u32>;

/// Immutable routing graph.
pub struct Graph {
    nodes: Vec<Coord<f64>>,
    edges: Vec<Edge>,
    /// Per-node `(neighbour, edge index)` sorted by ascending weight, then neighbour.
    adjacency: Vec<Vec<(NodeId, usize)>>,
    components: Vec<u32>,
    component_sizes: Vec<usize>,
    node_tree: RTree<NodePoint>,
    min_cost_factor: f64,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("components", &self.component_sizes.len())
            .finish_non_exhaustive()
    }
}

impl Graph {
    pub(crate) fn from_parts(nodes: Vec<Coord<f64>>, edges: Vec<Edge>, min_cost_factor: f64) -> Self {
        let mut adjacency: Vec<Vec<(NodeId, usize)>> = vec![Vec::new(); nodes.len()];
        for (position, edge) in edges.iter().enumerate() {
            if let Some(list) = adjacency.get_mut(edge.from.index()) {
                list.push((edge.to, position));
            }
            if let Some(list) = adjacency.get_mut(edge.to.index()) {
                list.push((edge.from, position));
            }
        }
        for list in &mut adjacency {
            list.sort_by(|(left_node, left_edge), (right_node, right_edge)| {
                let left_weight = edges.get(*left_edge).map_or(f64::INFINITY, |e| e.weight);
                let right_weight = edges.get(*right_edge).map_or(f64::INFINITY, |e| e.weight);
                left_weight
                    .total_cmp(&right_weight)
                    .then_with(|| left_node.cmp(right_node))
                    .then_with(|| left_edge.cmp(right_edge))
            });
        }
        let (components, component_sizes) = components::label(nodes.len(), &edges);
        let node_tree = RTree::bulk_load(
            nodes
                .iter()
                .zip(0_u32..)
                .map(|(coord, id)| NodePoint::new([coord.x, coord.y], id))
                .collect(),
        );
        Self {
            nodes,
            edges,
            adjacency,
            components,
            component_sizes,
            node_tree,
            min_cost_factor,
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Coordinate of `node`.
    pub fn node(&self, node: NodeId) -> Option<Coord<f64>> {
        self.nodes.get(node.index()).copied()
    }

    /// Edges in construction order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Neighbours of `node` with edge weights, cheapest first.
    pub fn neighbours(&self, node: NodeId) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.adjacency
            .get(node.index())
            .into_iter()
            .flatten()
            .filter_map(|(neighbour, edge)| {
                self.edges.get(*edge).map(|edge| (*neighbour, edge.weight))
            })
    }

    /// Connected-component label of `node`.
    pub fn component(&self, node: NodeId) -> Option<u32> {
        self.components.get(node.index()).copied()
    }

    /// Number of connected components.
    pub fn component_count(&self) -> usize {
        self.component_sizes.len()
    }

    /// Report describing the split, when the graph is disconnected.
    pub fn connectivity_warning(&self) -> Option<DisconnectedGraphWarning> {
        (self.component_sizes.len() > 1).then(|| DisconnectedGraphWarning {
            components: self.component_sizes.len(),
            largest: self.component_sizes.iter().copied().max().unwrap_or(0),
            nodes: self.nodes.len(),
        })
    }

    /// Smallest cost factor applied to any edge; scales the A\* heuristic.
    pub fn min_cost_factor(&self) -> f64 {
        self.min_cost_factor
    }

    /// Closest node to `point` and its distance; ties pick the lowest id.
    pub fn nearest_node(&self, point: Coord<f64>) -> Option<(NodeId, f64)> {
        let mut candidates = self
            .node_tree
            .nearest_neighbor_iter_with_distance_2(&[point.x, point.y]);
        let (first, best_2) = candidates.next()?;
        let mut best = first.data;
        for (candidate, distance_2) in candidates {
            if distance_2 > best_2 {
                break;
            }
            best = best.min(candidate.data);
        }
        Some((NodeId(best), best_2.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn edge(from: u32, to: u32, weight: f64) -> Edge {
        Edge {
            from: NodeId(from),
            to: NodeId(to),
            weight,
            way: FeatureId(1),
        }
    }

    #[rstest]
    fn neighbours_are_sorted_by_weight_then_id() {
        let nodes = vec![Coord { x: 0.0, y: 0.0 }; 4];
        let graph = Graph::from_parts(
            nodes,
            vec![edge(0, 3, 5.0), edge(0, 2, 1.0), edge(1, 0, 5.0)],
            1.0,
        );
        let order: Vec<u32> = graph.neighbours(NodeId(0)).map(|(n, _)| n.0).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[rstest]
    fn nearest_node_prefers_lowest_id_on_ties() {
        let nodes = vec![
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 0.0, y: 2.0 },
            Coord { x: 9.0, y: 9.0 },
        ];
        let graph = Graph::from_parts(nodes, Vec::new(), 1.0);
        let (node, distance) = graph.nearest_node(Coord { x: 1.0, y: 1.0 }).expect("node");
        assert_eq!(node, NodeId(0));
        assert!((distance - 2f64.sqrt()).abs() < 1e-12);
    }

    #[rstest]
    fn reports_disconnected_components() {
        let nodes = vec![Coord { x: 0.0, y: 0.0 }; 5];
        let graph = Graph::from_parts(nodes, vec![edge(0, 1, 1.0), edge(1, 2, 1.0), edge(3, 4, 1.0)], 1.0);
        let warning = graph.connectivity_warning().expect("disconnected");
        assert_eq!(warning.components, 2);
        assert_eq!(warning.largest, 3);
        assert_eq!(graph.component(NodeId(0)), graph.component(NodeId(2)));
        assert_ne!(graph.component(NodeId(0)), graph.component(NodeId(4)));
    }
}
