//! Extract loading for the campus map service.
//!
//! Responsibilities:
//! - Decode OSM PBF and Overpass JSON extracts.
//! - Normalise tags and resolve ways and multipolygon relations into
//!   [`campusmap_core::Feature`]s.
//! - Project WGS84 input into the plane the engine queries in.
//!
//! Boundaries:
//! - Do not encode query rules (live in `campusmap-core`).
//! - Loading is blocking; callers keep it off async executors.
//!
//! Invariants:
//! - A load either yields a complete [`campusmap_core::FeatureSet`] or an
//!   error; partial extracts are never returned.

mod ingest;

pub use ingest::{
    ExtractFormat, ExtractSource, LoadError, LoadOptions, LoadReport, LoadSummary,
    decode_feature_id, load_extract, load_extract_report,
};
