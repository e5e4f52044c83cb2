//! Canonical cache keys.

use std::fmt::{self, Write as _};

use geo::Coord;

use crate::engine::Query;

/// Decimal places kept when formatting coordinates.
const COORD_DECIMALS: usize = 7;

/// Canonical key for a [`Query`].
///
/// Logically identical queries map to the same fingerprint: coordinates are
/// fixed to seven decimals with negative zero normalised, tag filters use
/// their sorted canonical form and room references are upper-cased.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use campusmap_core::{TagFilter, cache::Fingerprint, engine::Query};
///
/// let query = Query::Nearest {
///     point: Coord { x: -0.0, y: 1.5 },
///     k: 3,
///     filter: "name,amenity=cafe".parse::<TagFilter>()?,
/// };
/// assert_eq!(
///     Fingerprint::of(&query).as_str(),
///     "nearest|x=0.0000000|y=1.5000000|k=3|tag=amenity=cafe,name"
/// );
/// # Ok::<(), campusmap_core::TagFilterError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint `query`.
    pub fn of(query: &Query) -> Self {
        let mut key = String::from(query.operation());
        match query {
            Query::Nearest { point, k, filter } => {
                push_coord(&mut key, "", *point);
                push(&mut key, "k", k);
                push(&mut key, "tag", filter);
            }
            Query::Route { from, to } => {
                push_coord(&mut key, "from_", *from);
                push_coord(&mut key, "to_", *to);
            }
            Query::Within { bbox, filter } => {
                push_coord(&mut key, "min_", bbox.min());
                push_coord(&mut key, "max_", bbox.max());
                push(&mut key, "tag", filter);
            }
            Query::FindRoom { building, room } => {
                push(&mut key, "building", building.trim());
                push(&mut key, "room", room.trim().to_uppercase());
            }
            Query::Buildings { kind } => push(&mut key, "kind", kind.trim()),
        }
        Self(key)
    }

    /// The canonical key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn push(key: &mut String, name: &str, value: impl fmt::Display) {
    // Writing to a String cannot fail.
    let _ = write!(key, "|{name}={value}");
}

fn push_coord(key: &mut String, prefix: &str, coord: Coord<f64>) {
    push(key, &format!("{prefix}x"), canonical_number(coord.x));
    push(key, &format!("{prefix}y"), canonical_number(coord.y));
}

fn canonical_number(value: f64) -> String {
    let formatted = format!("{value:.COORD_DECIMALS$}");
    match formatted.strip_prefix('-') {
        Some(magnitude) if magnitude.bytes().all(|b| b == b'0' || b == b'.') => magnitude.to_owned(),
        _ => formatted,
    }
}
