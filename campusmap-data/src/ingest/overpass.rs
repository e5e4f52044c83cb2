//! Overpass API JSON decoding (`[out:json]` with `out body`).

use std::{collections::BTreeMap, io::Read};

use serde::Deserialize;

use super::accumulator::{ExtractAccumulator, Member};
use super::ids::OsmElementKind;

#[derive(Debug, Deserialize)]
struct Document {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OverpassElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<OverpassMember>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct OverpassMember {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "ref")]
    id: i64,
    #[serde(default)]
    role: String,
}

fn pairs(tags: &BTreeMap<String, String>) -> impl Iterator<Item = (&str, &str)> {
    tags.iter().map(|(key, value)| (key.as_str(), value.as_str()))
}

/// Decode an Overpass document from `reader`.
pub(super) fn read<R: Read>(reader: R) -> Result<ExtractAccumulator, String> {
    let document: Document = serde_json::from_reader(reader).map_err(|err| err.to_string())?;
    let mut accumulator = ExtractAccumulator::default();
    for element in &document.elements {
        match element {
            OverpassElement::Node { id, lat, lon, tags } => {
                accumulator.process_node(*id, *lon, *lat, pairs(tags));
            }
            OverpassElement::Way { id, nodes, tags } => {
                accumulator.process_way(*id, nodes.iter().copied(), pairs(tags));
            }
            OverpassElement::Relation { id, members, tags } => {
                let members = members.iter().filter_map(|member| {
                    let kind = match member.kind.as_str() {
                        "node" => OsmElementKind::Node,
                        "way" => OsmElementKind::Way,
                        "relation" => OsmElementKind::Relation,
                        _ => return None,
                    };
                    Some(Member {
                        kind,
                        raw_id: member.id,
                        role: member.role.as_str(),
                    })
                });
                accumulator.process_relation(*id, members, pairs(tags));
            }
            OverpassElement::Other => {}
        }
    }
    Ok(accumulator)
}
