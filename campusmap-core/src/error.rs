//! Errors local to a single query.

use std::{fmt, time::Duration};

use thiserror::Error;

/// Which end of a route failed to snap onto the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The route origin.
    From,
    /// The route destination.
    To,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::From => "origin",
            Self::To => "destination",
        })
    }
}

/// Errors returned by query operations.
///
/// None of these affect other queries or the published dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// No dataset generation has been published yet.
    #[error("no dataset generation is ready")]
    NotReady,
    /// The endpoints lie in parts of the graph that are not connected.
    #[error("no path connects the requested points")]
    NoPath,
    /// An endpoint is farther from the graph than the snap radius allows.
    #[error("{endpoint} is {distance:.1} from the nearest path node; snap radius is {snap_radius:.1}")]
    UnreachablePoint {
        /// The endpoint that failed to snap.
        endpoint: Endpoint,
        /// Distance to the nearest graph node, or infinity for an empty graph.
        distance: f64,
        /// Configured snap radius.
        snap_radius: f64,
    },
    /// The search exhausted its expansion or wall-clock budget.
    #[error("query exceeded its budget after {expansions} expansions in {elapsed:?}")]
    Timeout {
        /// Expansions performed before giving up.
        expansions: usize,
        /// Wall-clock time spent.
        elapsed: Duration,
    },
    /// The caller abandoned the query.
    #[error("query was cancelled")]
    Cancelled,
    /// Arguments were syntactically valid but semantically unusable.
    #[error("invalid query: {message}")]
    InvalidArgument {
        /// Explanation for the caller.
        message: String,
    },
    /// No building carries the requested name.
    #[error("building {name:?} not found")]
    BuildingNotFound {
        /// Requested building name.
        name: String,
    },
    /// No room with the requested reference lies inside the building.
    #[error("room {room:?} not found in {building:?}")]
    RoomNotFound {
        /// Requested room reference, upper-cased.
        room: String,
        /// Requested building name.
        building: String,
    },
}
