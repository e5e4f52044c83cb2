//! Request parameters and response bodies.

use campusmap_core::{
    Feature, FeatureId, Geometry, Projection, Tags,
    engine::{Generation, RoomMatch},
};
use campusmap_data::decode_feature_id;
use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(super) struct NearestParams {
    pub(super) lat: f64,
    pub(super) lon: f64,
    #[serde(default)]
    pub(super) k: Option<usize>,
    #[serde(default)]
    pub(super) tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RouteParams {
    pub(super) from_lat: f64,
    pub(super) from_lon: f64,
    pub(super) to_lat: f64,
    pub(super) to_lon: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct FeaturesParams {
    /// `minlat,minlon,maxlat,maxlon`.
    pub(super) bbox: String,
    #[serde(default)]
    pub(super) tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FindRoomParams {
    #[serde(default)]
    pub(super) building: String,
    #[serde(default)]
    pub(super) room: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct BuildingsParams {
    #[serde(default)]
    pub(super) kind: Option<String>,
}

/// GeoJSON geometry with `[lon, lat]` positions.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub(super) enum GeometryBody {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl GeometryBody {
    fn from_wgs84(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Point(coord) => Self::Point {
                coordinates: position(*coord),
            },
            Geometry::Polyline(line) => Self::LineString {
                coordinates: positions(line),
            },
            Geometry::Polygon(polygon) => Self::Polygon {
                coordinates: std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(positions)
                    .collect(),
            },
        }
    }
}

fn position(coord: Coord<f64>) -> [f64; 2] {
    [coord.x, coord.y]
}

fn positions(line: &LineString<f64>) -> Vec<[f64; 2]> {
    line.coords().copied().map(position).collect()
}

#[derive(Debug, Serialize)]
pub(super) struct FeatureBody {
    pub(super) id: FeatureId,
    pub(super) osm_type: &'static str,
    pub(super) osm_id: u64,
    pub(super) lat: f64,
    pub(super) lon: f64,
    pub(super) tags: Tags,
    pub(super) geometry: GeometryBody,
}

impl FeatureBody {
    /// Describe `feature` in WGS84 using the snapshot's `projection`.
    pub(super) fn new(feature: &Feature, projection: Projection) -> Self {
        let wgs84 = feature
            .geometry
            .map_coords(move |coord| projection.inverse(coord));
        let anchor = wgs84.representative_point();
        let (osm_type, osm_id) = decode_feature_id(feature.id);
        Self {
            id: feature.id,
            osm_type,
            osm_id,
            lat: anchor.y,
            lon: anchor.x,
            tags: feature.tags.clone(),
            geometry: GeometryBody::from_wgs84(&wgs84),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NearestBody {
    #[serde(flatten)]
    pub(super) feature: FeatureBody,
    pub(super) distance_m: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct RouteBody {
    /// `[lat, lon]` pairs from origin to destination.
    pub(super) path: Vec<[f64; 2]>,
    pub(super) distance_m: f64,
    pub(super) generation: Generation,
}

#[derive(Debug, Serialize)]
pub(super) struct RoomBody {
    pub(super) room: FeatureBody,
    pub(super) building: FeatureBody,
}

impl RoomBody {
    pub(super) fn new(found: &RoomMatch, projection: Projection) -> Self {
        Self {
            room: FeatureBody::new(&found.room, projection),
            building: FeatureBody::new(&found.building, projection),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct GenerationBody {
    pub(super) generation: Generation,
}

#[derive(Debug, Serialize)]
pub(super) struct ClearedBody {
    pub(super) cleared: bool,
    pub(super) entries: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct ErrorBody {
    pub(super) error: String,
    pub(super) kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) stage: Option<String>,
}
