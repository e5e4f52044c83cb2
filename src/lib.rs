//! Facade crate for the campus map query service.
//!
//! This crate re-exports the core domain types and, behind the `loader`
//! feature, the OSM extract loader.

#![forbid(unsafe_code)]

pub use campusmap_core::{
    DatasetSource, Endpoint, Feature, FeatureId, FeatureSet, Geometry, NearestHit, Projection,
    ProjectionMode, QueryError, SearchBudget, SearchLimits, SourceError, SpatialIndex, TagFilter,
    Tags, cache, engine, graph, routing,
};

#[cfg(feature = "loader")]
pub use campusmap_data::{
    ExtractFormat, ExtractSource, LoadError, LoadOptions, LoadReport, LoadSummary, load_extract,
    load_extract_report,
};
