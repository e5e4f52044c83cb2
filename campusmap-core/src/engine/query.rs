//! Query descriptions and their results.

use std::sync::Arc;

use geo::{Coord, Rect};

use super::rooms::{BuildingSummary, RoomMatch};
use crate::{Feature, NearestHit, TagFilter, routing::RoutePlan};

/// Building kind listed when the caller does not ask for one.
pub const DEFAULT_BUILDING_KIND: &str = "university";

/// A read-only question asked of one snapshot. Coordinates are plane
/// coordinates of that snapshot's projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// The `k` closest features matching `filter`.
    Nearest {
        point: Coord<f64>,
        k: usize,
        filter: TagFilter,
    },
    /// The cheapest walking route between two points.
    Route { from: Coord<f64>, to: Coord<f64> },
    /// Features intersecting `bbox` and matching `filter`.
    Within { bbox: Rect<f64>, filter: TagFilter },
    /// A room by reference or name inside a named building.
    FindRoom { building: String, room: String },
    /// Buildings tagged `building=<kind>`.
    Buildings { kind: String },
}

impl Query {
    /// Short operation name used in logs and fingerprints.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Nearest { .. } => "nearest",
            Self::Route { .. } => "route",
            Self::Within { .. } => "bbox",
            Self::FindRoom { .. } => "find_room",
            Self::Buildings { .. } => "buildings",
        }
    }
}

/// Result of executing a [`Query`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QueryOutput {
    /// Answer to [`Query::Nearest`].
    Nearest(Vec<NearestHit>),
    /// Answer to [`Query::Route`].
    Route(RoutePlan),
    /// Answer to [`Query::Within`].
    Features(Vec<Arc<Feature>>),
    /// Answer to [`Query::FindRoom`].
    Room(RoomMatch),
    /// Answer to [`Query::Buildings`].
    Buildings(Vec<BuildingSummary>),
}
