//! OSM PBF decoding.

use std::io::Read;

use osmpbf::{Element, ElementReader, RelMemberType};

use super::accumulator::{ExtractAccumulator, Member};
use super::ids::OsmElementKind;

/// Decode every block of `reader` in parallel.
pub(super) fn read<R: Read + Send>(reader: R) -> Result<ExtractAccumulator, String> {
    ElementReader::new(reader)
        .par_map_reduce(
            |element| {
                let mut accumulator = ExtractAccumulator::default();
                process_element(&mut accumulator, element);
                accumulator
            },
            ExtractAccumulator::default,
            ExtractAccumulator::combine,
        )
        .map_err(|err| err.to_string())
}

fn process_element(accumulator: &mut ExtractAccumulator, element: Element<'_>) {
    match element {
        Element::Node(node) => accumulator.process_node(node.id(), node.lon(), node.lat(), node.tags()),
        Element::DenseNode(node) => {
            accumulator.process_node(node.id(), node.lon(), node.lat(), node.tags());
        }
        Element::Way(way) => accumulator.process_way(way.id(), way.refs(), way.tags()),
        Element::Relation(relation) => {
            let members: Vec<Member<'_>> = relation
                .members()
                .map(|member| Member {
                    kind: match member.member_type {
                        RelMemberType::Node => OsmElementKind::Node,
                        RelMemberType::Way => OsmElementKind::Way,
                        RelMemberType::Relation => OsmElementKind::Relation,
                    },
                    raw_id: member.member_id,
                    role: member.role().unwrap_or_default(),
                })
                .collect();
            accumulator.process_relation(relation.id(), members, relation.tags());
        }
    }
}
