//! Building and room lookups.

use std::sync::Arc;

use geo::{Intersects, Point};

use super::Snapshot;
use crate::{Feature, FeatureId, Geometry, QueryError, SearchBudget};

/// A room located inside a named building.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoomMatch {
    /// The `indoor=room` feature.
    pub room: Arc<Feature>,
    /// The building whose outline contains the room.
    pub building: Arc<Feature>,
}

/// Identifier and name of a listed building.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingSummary {
    pub id: FeatureId,
    pub name: Option<String>,
}

impl Snapshot {
    /// Find the room whose `ref` or `name` equals `room` (compared upper-case)
    /// and whose representative point lies inside a building named `building`.
    ///
    /// When several rooms qualify the lowest feature id wins.
    pub fn find_room(
        &self,
        building: &str,
        room: &str,
        budget: &mut SearchBudget,
    ) -> Result<RoomMatch, QueryError> {
        let building_name = building.trim();
        let room_ref = room.trim().to_uppercase();
        if building_name.is_empty() || room_ref.is_empty() {
            return Err(QueryError::InvalidArgument {
                message: "building and room must both be given".to_owned(),
            });
        }

        let mut outlines = Vec::new();
        for feature in self.features.features() {
            budget.tick()?;
            if feature.tag("building").is_some()
                && feature.tag("name") == Some(building_name)
                && matches!(feature.geometry, Geometry::Polygon(_))
            {
                outlines.push(feature);
            }
        }
        if outlines.is_empty() {
            return Err(QueryError::BuildingNotFound {
                name: building_name.to_owned(),
            });
        }

        for feature in self.features.features() {
            budget.tick()?;
            if feature.tag("indoor") != Some("room") {
                continue;
            }
            let identified = feature.tag("ref") == Some(room_ref.as_str())
                || feature.tag("name") == Some(room_ref.as_str());
            if !identified {
                continue;
            }
            let centre = Point(feature.geometry.representative_point());
            let container = outlines.iter().find(|outline| match &outline.geometry {
                Geometry::Polygon(polygon) => polygon.intersects(&centre),
                _ => false,
            });
            if let Some(container) = container {
                return Ok(RoomMatch {
                    room: Arc::clone(feature),
                    building: Arc::clone(container),
                });
            }
        }
        Err(QueryError::RoomNotFound {
            room: room_ref,
            building: building_name.to_owned(),
        })
    }

    /// List features tagged `building=<kind>` in ascending id order.
    pub fn buildings(&self, kind: &str) -> Vec<BuildingSummary> {
        let kind = kind.trim();
        self.features
            .features()
            .iter()
            .filter(|feature| feature.tag("building") == Some(kind))
            .map(|feature| BuildingSummary {
                id: feature.id,
                name: feature.tag("name").map(str::to_owned),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{QueryError, SearchBudget, test_support::campus_engine};
    use rstest::rstest;

    #[rstest]
    #[case("g.01")]
    #[case("G.01")]
    #[case(" g.01 ")]
    fn room_lookup_is_case_insensitive_on_the_room(#[case] room: &str) {
        let snapshot = campus_engine().snapshot().expect("ready");
        let found = snapshot
            .find_room("Main Hall", room, &mut SearchBudget::unlimited())
            .expect("room");
        assert_eq!(found.room.tag("ref"), Some("G.01"));
        assert_eq!(found.building.tag("name"), Some("Main Hall"));
    }

    #[rstest]
    fn room_outside_the_building_is_not_found() {
        let snapshot = campus_engine().snapshot().expect("ready");
        let err = snapshot
            .find_room("Main Hall", "X.99", &mut SearchBudget::unlimited())
            .expect_err("outside");
        assert_eq!(
            err,
            QueryError::RoomNotFound {
                room: "X.99".into(),
                building: "Main Hall".into(),
            }
        );
    }

    #[rstest]
    fn unknown_building_is_reported() {
        let snapshot = campus_engine().snapshot().expect("ready");
        let err = snapshot
            .find_room("Nowhere", "G.01", &mut SearchBudget::unlimited())
            .expect_err("missing building");
        assert_eq!(err, QueryError::BuildingNotFound { name: "Nowhere".into() });
    }

    #[rstest]
    fn lists_buildings_of_the_requested_kind() {
        let snapshot = campus_engine().snapshot().expect("ready");
        let names: Vec<Option<String>> = snapshot
            .buildings("university")
            .into_iter()
            .map(|summary| summary.name)
            .collect();
        assert_eq!(names, vec![Some("Main Hall".to_owned())]);
        let retail: Vec<Option<String>> = snapshot
            .buildings("retail")
            .into_iter()
            .map(|summary| summary.name)
            .collect();
        assert_eq!(retail, vec![Some("Campus Shop".to_owned())]);
        assert!(snapshot.buildings("dormitory").is_empty());
    }
}
