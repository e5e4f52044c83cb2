//! Reload failures.

use std::fmt;

use thiserror::Error;

use crate::{IndexError, SourceError, graph::GraphError};

/// Pipeline stage at which a reload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReloadStage {
    /// Reading or decoding the extract.
    Load,
    /// Building the spatial index.
    Index,
    /// Deriving the routing graph.
    Graph,
}

impl fmt::Display for ReloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Index => "index",
            Self::Graph => "graph",
        })
    }
}

/// A reload that left the published generation untouched.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The dataset source failed.
    #[error("reload failed while loading: {0}")]
    Load(#[from] SourceError),
    /// The loaded features could not be indexed.
    #[error("reload failed while indexing: {0}")]
    Index(#[from] IndexError),
    /// The routing graph could not be derived.
    #[error("reload failed while building the graph: {0}")]
    Graph(#[from] GraphError),
}

impl ReloadError {
    /// Stage at which the pipeline stopped.
    pub fn stage(&self) -> ReloadStage {
        match self {
            Self::Load(_) => ReloadStage::Load,
            Self::Index(_) => ReloadStage::Index,
            Self::Graph(_) => ReloadStage::Graph,
        }
    }

    /// Whether retrying the same reload may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Load(source) if source.is_transient())
    }
}
