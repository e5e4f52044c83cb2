//! Mapping between WGS84 coordinates and the plane used by every query.
//!
//! A campus extract spans a few kilometres at most, so an equirectangular
//! projection around the extract centre keeps Euclidean distances within a
//! small fraction of a percent of great-circle distances.

use geo::{Coord, Rect};

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Which projection a loader should apply to an extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ProjectionMode {
    /// Keep input coordinates as plane coordinates.
    Planar,
    /// Project to metres around the centre of the extract bounds.
    #[default]
    LocalMetres,
}

/// Concrete projection bound to a dataset.
///
/// Coordinates use `x = longitude`, `y = latitude` on the WGS84 side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Identity mapping; plane units equal input units.
    Planar,
    /// Equirectangular projection in metres around `origin`.
    LocalMetres {
        /// Projection centre in WGS84.
        origin: Coord<f64>,
        /// Cosine of the origin latitude, cached.
        cos_lat: f64,
    },
}

impl Projection {
    /// Build a local metric projection centred on `origin`.
    pub fn local_metres(origin: Coord<f64>) -> Self {
        Self::LocalMetres {
            origin,
            cos_lat: origin.y.to_radians().cos(),
        }
    }

    /// Resolve `mode` for an extract covering `bounds`.
    pub fn for_bounds(mode: ProjectionMode, bounds: Option<Rect<f64>>) -> Self {
        match (mode, bounds) {
            (ProjectionMode::LocalMetres, Some(bounds)) => Self::local_metres(bounds.center()),
            (ProjectionMode::LocalMetres, None) => Self::local_metres(Coord { x: 0.0, y: 0.0 }),
            (ProjectionMode::Planar, _) => Self::Planar,
        }
    }

    /// Map a WGS84 coordinate into the plane.
    pub fn forward(&self, wgs84: Coord<f64>) -> Coord<f64> {
        match *self {
            Self::Planar => wgs84,
            Self::LocalMetres { origin, cos_lat } => Coord {
                x: (wgs84.x - origin.x).to_radians() * cos_lat * EARTH_RADIUS_M,
                y: (wgs84.y - origin.y).to_radians() * EARTH_RADIUS_M,
            },
        }
    }

    /// Map a plane coordinate back to WGS84.
    pub fn inverse(&self, plane: Coord<f64>) -> Coord<f64> {
        match *self {
            Self::Planar => plane,
            Self::LocalMetres { origin, cos_lat } => Coord {
                x: origin.x + (plane.x / (EARTH_RADIUS_M * cos_lat)).to_degrees(),
                y: origin.y + (plane.y / EARTH_RADIUS_M).to_degrees(),
            },
        }
    }

    /// Map a WGS84 rectangle into the plane.
    pub fn forward_rect(&self, rect: Rect<f64>) -> Rect<f64> {
        Rect::new(self.forward(rect.min()), self.forward(rect.max()))
    }

    /// Default tolerance under which two vertices are treated as one junction.
    pub fn merge_tolerance(&self) -> f64 {
        match self {
            Self::Planar => 1e-9,
            Self::LocalMetres { .. } => 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn planar_is_identity() {
        let coord = Coord { x: 3.5, y: -1.25 };
        assert_eq!(Projection::Planar.forward(coord), coord);
        assert_eq!(Projection::Planar.inverse(coord), coord);
    }

    #[rstest]
    fn local_metres_round_trips_near_origin() {
        let projection = Projection::local_metres(Coord { x: -1.2578, y: 51.7548 });
        let point = Coord { x: -1.2550, y: 51.7560 };
        let back = projection.inverse(projection.forward(point));
        assert!((back.x - point.x).abs() < 1e-9);
        assert!((back.y - point.y).abs() < 1e-9);
    }

    #[rstest]
    fn one_thousandth_degree_of_latitude_is_about_111_metres() {
        let projection = Projection::local_metres(Coord { x: 0.0, y: 45.0 });
        let plane = projection.forward(Coord { x: 0.0, y: 45.001 });
        assert!((plane.y - 111.19).abs() < 0.1, "got {}", plane.y);
        assert!(plane.x.abs() < 1e-9);
    }
}
