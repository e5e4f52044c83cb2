//! Immutable geospatial features derived from an OSM extract.
//!
//! Geometry is expressed in plane coordinates (see [`crate::Projection`]); all
//! distance computations in this crate are Euclidean in that plane.

use std::{collections::BTreeMap, fmt, str::FromStr};

use geo::{BoundingRect, Centroid, Coord, Intersects, LineString, MapCoords, Polygon, Rect};
use thiserror::Error;

/// Canonical key/value tags. Keys are lower-cased by the loader.
pub type Tags = BTreeMap<String, String>;

/// Identifier of a feature, unique within one dataset generation.
///
/// Loaders encode the OSM element kind into the two most significant bits so
/// that nodes, ways and relations sharing a raw OSM id never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FeatureId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Shape of a feature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    /// A single location, typically a tagged OSM node.
    Point(Coord<f64>),
    /// An open way such as a footpath or corridor.
    Polyline(LineString<f64>),
    /// A closed area such as a building outline or room.
    Polygon(Polygon<f64>),
}

impl Geometry {
    /// Axis-aligned bounds of the geometry, if it has any coordinates.
    pub fn envelope(&self) -> Option<Rect<f64>> {
        match self {
            Self::Point(coord) => Some(Rect::new(*coord, *coord)),
            Self::Polyline(line) => line.bounding_rect(),
            Self::Polygon(polygon) => polygon.bounding_rect(),
        }
    }

    /// A single coordinate standing in for the geometry in point-based output.
    ///
    /// Polygons and polylines use their centroid, falling back to the first
    /// vertex for degenerate shapes.
    pub fn representative_point(&self) -> Coord<f64> {
        let centroid = match self {
            Self::Point(coord) => return *coord,
            Self::Polyline(line) => line.centroid(),
            Self::Polygon(polygon) => polygon.centroid(),
        };
        centroid
            .map(|point| point.0)
            .or_else(|| self.coords().next())
            .unwrap_or(Coord { x: 0.0, y: 0.0 })
    }

    /// Euclidean distance from `point` to the closest part of the geometry.
    ///
    /// Points inside a polygon (boundary included) are at distance zero.
    pub fn distance_to(&self, point: Coord<f64>) -> f64 {
        match self {
            Self::Point(coord) => coord_distance(*coord, point),
            Self::Polyline(line) => line_distance(line, point),
            Self::Polygon(polygon) => {
                if polygon.intersects(&point) {
                    return 0.0;
                }
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(|ring| line_distance(ring, point))
                    .fold(f64::INFINITY, f64::min)
            }
        }
    }

    /// Whether the geometry touches `rect`. Boundary contact counts.
    pub fn intersects_rect(&self, rect: &Rect<f64>) -> bool {
        match self {
            Self::Point(coord) => rect.intersects(coord),
            Self::Polyline(line) => rect.intersects(line),
            Self::Polygon(polygon) => rect.intersects(polygon),
        }
    }

    /// Iterate over every vertex, exterior ring first for polygons.
    pub fn coords(&self) -> Box<dyn Iterator<Item = Coord<f64>> + '_> {
        match self {
            Self::Point(coord) => Box::new(std::iter::once(*coord)),
            Self::Polyline(line) => Box::new(line.coords().copied()),
            Self::Polygon(polygon) => Box::new(
                polygon
                    .exterior()
                    .coords()
                    .chain(polygon.interiors().iter().flat_map(|ring| ring.coords()))
                    .copied(),
            ),
        }
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.coords().all(|c| c.x.is_finite() && c.y.is_finite())
    }

    /// Apply `f` to every coordinate, preserving the shape kind.
    pub fn map_coords(&self, f: impl Fn(Coord<f64>) -> Coord<f64> + Copy) -> Self {
        match self {
            Self::Point(coord) => Self::Point(f(*coord)),
            Self::Polyline(line) => Self::Polyline(line.map_coords(f)),
            Self::Polygon(polygon) => Self::Polygon(polygon.map_coords(f)),
        }
    }
}

/// A loaded map feature.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use campusmap_core::{Feature, FeatureId, Geometry, Tags};
///
/// let feature = Feature::new(
///     FeatureId(1),
///     Geometry::Point(Coord { x: 0.0, y: 0.0 }),
///     Tags::from([("amenity".into(), "cafe".into())]),
/// );
/// assert_eq!(feature.tag("amenity"), Some("cafe"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry,
    pub tags: Tags,
}

impl Feature {
    /// Construct a feature from its parts.
    pub fn new(id: FeatureId, geometry: Geometry, tags: Tags) -> Self {
        Self { id, geometry, tags }
    }

    /// Look up a tag value by canonical key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Errors returned when parsing a tag filter clause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagFilterError {
    /// The clause had no key, e.g. `""` or `"=cafe"`.
    #[error("tag filter {clause:?} has an empty key")]
    EmptyKey { clause: String },
}

/// One `key` or `key=value` predicate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagClause {
    key: String,
    value: Option<String>,
}

impl TagClause {
    /// Require `key` to be present.
    pub fn has_key(key: &str) -> Self {
        Self {
            key: key.trim().to_lowercase(),
            value: None,
        }
    }

    /// Require `key` to equal `value`.
    pub fn equals(key: &str, value: &str) -> Self {
        Self {
            key: key.trim().to_lowercase(),
            value: Some(value.trim().to_owned()),
        }
    }

    fn matches(&self, tags: &Tags) -> bool {
        match (&self.value, tags.get(&self.key)) {
            (None, found) => found.is_some(),
            (Some(expected), Some(found)) => expected == found,
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for TagClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => f.write_str(&self.key),
        }
    }
}

impl FromStr for TagClause {
    type Err = TagFilterError;

    fn from_str(clause: &str) -> Result<Self, Self::Err> {
        let (key, value) = match clause.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (clause, None),
        };
        if key.trim().is_empty() {
            return Err(TagFilterError::EmptyKey {
                clause: clause.to_owned(),
            });
        }
        Ok(match value {
            Some(value) => Self::equals(key, value),
            None => Self::has_key(key),
        })
    }
}

/// Conjunction of tag clauses. The empty filter matches everything.
///
/// Clauses are kept sorted and de-duplicated so that logically identical
/// filters compare and display identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagFilter {
    clauses: Vec<TagClause>,
}

impl TagFilter {
    /// A filter that accepts every feature.
    pub fn any() -> Self {
        Self::default()
    }

    /// Build a filter from clauses in any order.
    pub fn from_clauses(clauses: impl IntoIterator<Item = TagClause>) -> Self {
        let mut clauses: Vec<_> = clauses.into_iter().collect();
        clauses.sort();
        clauses.dedup();
        Self { clauses }
    }

    /// Whether the filter accepts no restriction.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `tags` satisfy every clause.
    pub fn matches(&self, tags: &Tags) -> bool {
        self.clauses.iter().all(|clause| clause.matches(tags))
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, clause) in self.clauses.iter().enumerate() {
            if position > 0 {
                f.write_str(",")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

impl FromStr for TagFilter {
    type Err = TagFilterError;

    /// Parse a comma-separated list of clauses; blank input yields [`TagFilter::any`].
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().is_empty() {
            return Ok(Self::any());
        }
        let clauses = raw
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<TagClause>, _>>()?;
        Ok(Self::from_clauses(clauses))
    }
}

pub(crate) fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn segment_distance(point: Coord<f64>, start: Coord<f64>, end: Coord<f64>) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return coord_distance(point, start);
    }
    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    coord_distance(
        point,
        Coord {
            x: start.x + t * dx,
            y: start.y + t * dy,
        },
    )
}

fn line_distance(line: &LineString<f64>, point: Coord<f64>) -> f64 {
    let mut coords = line.coords();
    let Some(first) = coords.next() else {
        return f64::INFINITY;
    };
    let mut best = coord_distance(*first, point);
    for segment in line.lines() {
        best = best.min(segment_distance(point, segment.start, segment.end));
    }
    best
}
