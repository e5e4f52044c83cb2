//! Stitching relation member ways into closed rings.

use std::collections::VecDeque;

/// Join way node lists end to end until every ring closes.
///
/// Segments may be reversed to connect. Returns `None` when any ring cannot
/// be closed from the remaining segments, including when fewer than four
/// nodes close a loop.
pub(super) fn assemble_rings(segments: Vec<Vec<u64>>) -> Option<Vec<Vec<u64>>> {
    let mut remaining: VecDeque<Vec<u64>> =
        segments.into_iter().filter(|segment| segment.len() >= 2).collect();
    let mut rings = Vec::new();
    while let Some(mut ring) = remaining.pop_front() {
        while !is_closed(&ring) {
            let tail = *ring.last()?;
            let position = remaining.iter().position(|segment| {
                segment.first() == Some(&tail) || segment.last() == Some(&tail)
            })?;
            let mut next = remaining.remove(position)?;
            if next.first() != Some(&tail) {
                next.reverse();
            }
            ring.extend(next.into_iter().skip(1));
        }
        rings.push(ring);
    }
    (!rings.is_empty()).then_some(rings)
}

fn is_closed(ring: &[u64]) -> bool {
    ring.len() >= 4 && ring.first() == ring.last()
}
