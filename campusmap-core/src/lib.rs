//! Core domain for the campus map service.
//!
//! Features are loaded into a [`FeatureSet`], indexed by a [`SpatialIndex`]
//! and turned into a routing [`graph::Graph`]. The [`engine::QueryEngine`]
//! publishes these as immutable, numbered generations and answers nearest,
//! bounding-box, routing and room queries against whichever generation a
//! query pinned. [`cache`] memoises answers per generation.

mod budget;
mod dataset;
mod error;
mod feature;
mod index;
mod projection;

pub mod cache;
pub mod engine;
pub mod graph;
pub mod routing;

#[doc(hidden)]
pub mod test_support;

pub use budget::{SearchBudget, SearchLimits};
pub use dataset::{DatasetSource, FeatureSet, SourceError};
pub use error::{Endpoint, QueryError};
pub use feature::{Feature, FeatureId, Geometry, TagClause, TagFilter, TagFilterError, Tags};
pub use index::{IndexError, NearestHit, SpatialIndex};
pub use projection::{Projection, ProjectionMode};
