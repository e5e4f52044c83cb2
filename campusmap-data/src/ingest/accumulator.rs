//! Collects raw OSM elements and resolves them into features.
//!
//! Nodes, ways and relations may arrive in any order and in parallel
//! batches, so resolution happens once everything has been combined.
use std::collections::HashMap;

use campusmap_core::{Feature, FeatureId, Geometry, Projection, ProjectionMode, Tags};
use geo::{Area, Coord, LineString, Polygon};
use log::{debug, warn};

use super::LoadSummary;
use super::ids::{OsmElementKind, encode_element_id};
use super::rings::assemble_rings;
use super::tags::{has_meaningful_tags, is_area, normalise_tags};

/// Relation `type` values that describe an area.
const AREA_RELATION_TYPES: &[&str] = &["multipolygon", "building"];

#[derive(Debug)]
struct WayCandidate {
    id: u64,
    tags: Tags,
}

#[derive(Debug)]
struct RelationCandidate {
    id: u64,
    tags: Tags,
    outer: Vec<u64>,
    inner: Vec<u64>,
}

/// A relation member as delivered by a decoder.
#[derive(Debug, Clone, Copy)]
pub(super) struct Member<'a> {
    pub(super) kind: OsmElementKind,
    pub(super) raw_id: i64,
    pub(super) role: &'a str,
}

#[derive(Debug, Default)]
pub(super) struct ExtractAccumulator {
    summary: LoadSummary,
    nodes: HashMap<u64, Coord<f64>>,
    points: Vec<(u64, Coord<f64>, Tags)>,
    way_refs: HashMap<u64, Vec<u64>>,
    ways: Vec<WayCandidate>,
    relations: Vec<RelationCandidate>,
}

impl ExtractAccumulator {
    pub(super) fn process_node<'a, T>(&mut self, raw_id: i64, lon: f64, lat: f64, tags: T)
    where
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.summary.record_node(lon, lat);
        let Some(id) = encode_element_id(OsmElementKind::Node, raw_id) else {
            return;
        };
        let Some(location) = validated_coord(lon, lat) else {
            warn!("skipped OSM node {raw_id}: coordinate ({lon}, {lat}) is out of range");
            return;
        };
        self.nodes.insert(id, location);
        let tags = normalise_tags(tags);
        if has_meaningful_tags(&tags, &[]) {
            self.points.push((id, location, tags));
        }
    }

    pub(super) fn process_way<'a, R, T>(&mut self, raw_id: i64, refs: R, tags: T)
    where
        R: IntoIterator<Item = i64>,
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.summary.record_way();
        let Some(id) = encode_element_id(OsmElementKind::Way, raw_id) else {
            return;
        };
        let node_refs: Vec<u64> = refs
            .into_iter()
            .filter_map(|node_id| encode_element_id(OsmElementKind::Node, node_id))
            .collect();
        self.way_refs.insert(id, node_refs);
        let tags = normalise_tags(tags);
        if has_meaningful_tags(&tags, &[]) {
            self.ways.push(WayCandidate { id, tags });
        }
    }

    pub(super) fn process_relation<'a, M, T>(&mut self, raw_id: i64, members: M, tags: T)
    where
        M: IntoIterator<Item = Member<'a>>,
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.summary.record_relation();
        let Some(id) = encode_element_id(OsmElementKind::Relation, raw_id) else {
            return;
        };
        let tags = normalise_tags(tags);
        let is_area_relation = tags
            .get("type")
            .is_some_and(|kind| AREA_RELATION_TYPES.contains(&kind.as_str()));
        if !is_area_relation || !has_meaningful_tags(&tags, &["type"]) {
            return;
        }
        let mut candidate = RelationCandidate {
            id,
            tags,
            outer: Vec::new(),
            inner: Vec::new(),
        };
        for member in members {
            if member.kind != OsmElementKind::Way {
                continue;
            }
            let Some(way_id) = encode_element_id(OsmElementKind::Way, member.raw_id) else {
                continue;
            };
            match member.role.trim() {
                "inner" => candidate.inner.push(way_id),
                "outer" | "" => candidate.outer.push(way_id),
                _ => {}
            }
        }
        self.relations.push(candidate);
    }

    pub(super) fn combine(mut self, other: Self) -> Self {
        self.summary = self.summary.combine(other.summary);
        for (id, coord) in other.nodes {
            self.nodes.entry(id).or_insert(coord);
        }
        for (id, refs) in other.way_refs {
            self.way_refs.entry(id).or_insert(refs);
        }
        self.points.extend(other.points);
        self.ways.extend(other.ways);
        self.relations.extend(other.relations);
        self
    }

    /// Resolve every candidate into a projected feature.
    pub(super) fn finish(mut self, mode: ProjectionMode) -> (Vec<Feature>, Projection, LoadSummary) {
        let mut resolved = Vec::with_capacity(self.points.len() + self.ways.len());
        for (id, location, tags) in std::mem::take(&mut self.points) {
            resolved.push(Feature::new(FeatureId(id), Geometry::Point(location), tags));
        }
        for way in std::mem::take(&mut self.ways) {
            match self.way_geometry(way.id, &way.tags) {
                Some(geometry) => resolved.push(Feature::new(FeatureId(way.id), geometry, way.tags)),
                None => self.skip("way", way.id),
            }
        }
        for relation in std::mem::take(&mut self.relations) {
            match self.relation_geometry(&relation) {
                Some(geometry) => resolved.push(Feature::new(
                    FeatureId(relation.id),
                    geometry,
                    relation.tags,
                )),
                None => self.skip("relation", relation.id),
            }
        }

        let projection = Projection::for_bounds(mode, self.summary.bounds);
        let features = resolved
            .into_iter()
            .map(|feature| Feature {
                geometry: feature
                    .geometry
                    .map_coords(move |coord| projection.forward(coord)),
                ..feature
            })
            .collect::<Vec<_>>();
        self.summary.features = features.len() as u64;
        (features, projection, self.summary)
    }

    fn skip(&mut self, kind: &str, id: u64) {
        debug!("skipped {kind} {id}: geometry could not be resolved");
        self.summary.skipped += 1;
    }

    fn way_geometry(&self, id: u64, tags: &Tags) -> Option<Geometry> {
        let refs = self.way_refs.get(&id)?;
        let coords = self.resolve(refs);
        let complete = coords.len() == refs.len();
        let closed = refs.len() >= 4 && refs.first() == refs.last();
        if complete && closed && is_area(tags) {
            return Some(Geometry::Polygon(Polygon::new(LineString::new(coords), Vec::new())));
        }
        if !complete {
            debug!(
                "way {id} references {} nodes outside the extract",
                refs.len() - coords.len()
            );
        }
        (coords.len() >= 2).then(|| Geometry::Polyline(LineString::new(coords)))
    }

    fn relation_geometry(&self, relation: &RelationCandidate) -> Option<Geometry> {
        let outer = self.rings(&relation.outer)?;
        let inner = if relation.inner.is_empty() {
            Vec::new()
        } else {
            self.rings(&relation.inner)?
        };
        let mut outer = outer.into_iter();
        let mut exterior = outer.next()?;
        let mut exterior_area = ring_area(&exterior);
        for ring in outer {
            let area = ring_area(&ring);
            if area > exterior_area {
                exterior = ring;
                exterior_area = area;
            }
        }
        Some(Geometry::Polygon(Polygon::new(exterior, inner)))
    }

    fn rings(&self, way_ids: &[u64]) -> Option<Vec<LineString<f64>>> {
        let segments = way_ids
            .iter()
            .map(|way_id| self.way_refs.get(way_id).cloned())
            .collect::<Option<Vec<_>>>()?;
        assemble_rings(segments)?
            .into_iter()
            .map(|ring| {
                let coords = self.resolve(&ring);
                (coords.len() == ring.len()).then(|| LineString::new(coords))
            })
            .collect()
    }

    fn resolve(&self, refs: &[u64]) -> Vec<Coord<f64>> {
        refs.iter()
            .filter_map(|node_id| self.nodes.get(node_id).copied())
            .collect()
    }
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), Vec::new()).unsigned_area()
}

fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}
