//! Connected-component labelling via union-find.

use super::Edge;

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        let mut root = node;
        while let Some(&parent) = self.parent.get(root)
            && parent != root
        {
            root = parent;
        }
        while let Some(parent) = self.parent.get_mut(node)
            && *parent != root
        {
            node = std::mem::replace(parent, root);
        }
        root
    }

    fn union(&mut self, left: usize, right: usize) {
        let (left, right) = (self.find(left), self.find(right));
        if left == right {
            return;
        }
        let left_rank = self.rank.get(left).copied().unwrap_or(0);
        let right_rank = self.rank.get(right).copied().unwrap_or(0);
        let (child, root) = if left_rank < right_rank {
            (left, right)
        } else {
            (right, left)
        };
        if let Some(parent) = self.parent.get_mut(child) {
            *parent = root;
        }
        if left_rank == right_rank
            && let Some(rank) = self.rank.get_mut(root)
        {
            *rank = rank.saturating_add(1);
        }
    }
}

/// Label every node with a component number and count component sizes.
///
/// Labels are dense and assigned in order of each component's lowest node id.
pub(super) fn label(node_count: usize, edges: &[Edge]) -> (Vec<u32>, Vec<usize>) {
    let mut set = DisjointSet::new(node_count);
    for edge in edges {
        set.union(edge.from.index(), edge.to.index());
    }
    let mut root_labels: Vec<Option<u32>> = vec![None; node_count];
    let mut labels = Vec::with_capacity(node_count);
    let mut sizes: Vec<usize> = Vec::new();
    for node in 0..node_count {
        let root = set.find(node);
        let label = match root_labels.get(root).copied().flatten() {
            Some(label) => label,
            None => {
                let label = u32::try_from(sizes.len()).unwrap_or(u32::MAX);
                if let Some(slot) = root_labels.get_mut(root) {
                    *slot = Some(label);
                }
                sizes.push(0);
                label
            }
        };
        if let Some(size) = sizes.get_mut(label as usize) {
            *size += 1;
        }
        labels.push(label);
    }
    (labels, sizes)
}
