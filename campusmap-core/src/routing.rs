//! Shortest paths over a [`Graph`].
//!
//! The search is A\* with a straight-line heuristic scaled by the cheapest
//! cost factor in the graph, which never overestimates the remaining cost.
//! Results are deterministic: queue ties are broken by insertion order,
//! adjacency is visited cheapest first and a node is only relaxed by a
//! strictly shorter distance, so the first path discovered wins a tie.

use std::{cmp::Ordering, collections::BinaryHeap};

use geo::Coord;

use crate::{
    QueryError, SearchBudget,
    feature::coord_distance,
    graph::{Graph, NodeId},
};

/// A computed route.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutePlan {
    /// Node coordinates from origin to destination.
    pub path: Vec<Coord<f64>>,
    /// Total edge weight.
    pub distance: f64,
    /// Graph nodes visited, in order.
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    estimate: f64,
    sequence: u64,
    node: NodeId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed so the max-heap pops the smallest estimate, then the oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Find the cheapest path between two graph nodes.
///
/// Returns [`QueryError::NoPath`] when the nodes are in different components
/// (without searching) or when the search exhausts the reachable nodes.
pub fn shortest_path(
    graph: &Graph,
    from: NodeId,
    to: NodeId,
    budget: &mut SearchBudget,
) -> Result<RoutePlan, QueryError> {
    let (Some(start), Some(goal)) = (graph.node(from), graph.node(to)) else {
        return Err(QueryError::NoPath);
    };
    if graph.component(from) != graph.component(to) {
        return Err(QueryError::NoPath);
    }
    if from == to {
        return Ok(RoutePlan {
            path: vec![start],
            distance: 0.0,
            nodes: vec![from],
        });
    }

    let heuristic_scale = graph.min_cost_factor();
    let heuristic = |coord: Coord<f64>| coord_distance(coord, goal) * heuristic_scale;

    let mut best = vec![f64::INFINITY; graph.node_count()];
    let mut previous: Vec<Option<NodeId>> = vec![None; graph.node_count()];
    let mut settled = vec![false; graph.node_count()];
    let mut queue = BinaryHeap::new();
    let mut sequence = 0_u64;

    set(&mut best, from, 0.0);
    queue.push(QueueEntry {
        estimate: heuristic(start),
        sequence,
        node: from,
    });

    while let Some(QueueEntry { node, .. }) = queue.pop() {
        if settled.get(node.index()).copied().unwrap_or(true) {
            continue;
        }
        if let Some(flag) = settled.get_mut(node.index()) {
            *flag = true;
        }
        budget.tick()?;
        if node == to {
            return Ok(reconstruct(graph, &previous, from, to, best_of(&best, to)));
        }
        let distance = best_of(&best, node);
        for (neighbour, weight) in graph.neighbours(node) {
            let candidate = distance + weight;
            if candidate < best_of(&best, neighbour) {
                set(&mut best, neighbour, candidate);
                if let Some(slot) = previous.get_mut(neighbour.index()) {
                    *slot = Some(node);
                }
                let Some(coord) = graph.node(neighbour) else {
                    continue;
                };
                sequence += 1;
                queue.push(QueueEntry {
                    estimate: candidate + heuristic(coord),
                    sequence,
                    node: neighbour,
                });
            }
        }
    }
    Err(QueryError::NoPath)
}

fn best_of(best: &[f64], node: NodeId) -> f64 {
    best.get(node.index()).copied().unwrap_or(f64::INFINITY)
}

fn set(best: &mut [f64], node: NodeId, value: f64) {
    if let Some(slot) = best.get_mut(node.index()) {
        *slot = value;
    }
}

fn reconstruct(
    graph: &Graph,
    previous: &[Option<NodeId>],
    from: NodeId,
    to: NodeId,
    distance: f64,
) -> RoutePlan {
    let mut nodes = vec![to];
    let mut cursor = to;
    while cursor != from {
        match previous.get(cursor.index()).copied().flatten() {
            Some(prior) => {
                nodes.push(prior);
                cursor = prior;
            }
            None => break,
        }
    }
    nodes.reverse();
    let path = nodes.iter().filter_map(|node| graph.node(*node)).collect();
    RoutePlan {
        path,
        distance,
        nodes,
    }
}
