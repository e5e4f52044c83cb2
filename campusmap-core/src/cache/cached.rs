//! Query engine fronted by a cache.

use std::{fmt, sync::Arc};

use log::{debug, warn};

use super::{CacheError, Fingerprint, QueryCache};
use crate::{
    QueryError,
    engine::{Query, QueryContext, QueryEngine, QueryOutput, Snapshot},
};

/// Runs queries through a [`QueryCache`] before touching the engine.
///
/// Cache failures degrade to direct execution and are logged, never
/// returned. Only successful results are stored.
#[derive(Clone)]
pub struct CachedEngine {
    engine: Arc<QueryEngine>,
    cache: Arc<dyn QueryCache>,
}

impl fmt::Debug for CachedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedEngine")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl CachedEngine {
    /// Combine `engine` with `cache`.
    pub fn new(engine: Arc<QueryEngine>, cache: Arc<dyn QueryCache>) -> Self {
        Self { engine, cache }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    /// Pin the current snapshot and answer `query` against it.
    pub fn execute(
        &self,
        query: &Query,
        context: &QueryContext,
    ) -> Result<Arc<QueryOutput>, QueryError> {
        let snapshot = self.engine.snapshot()?;
        self.execute_on(&snapshot, query, context)
    }

    /// Answer `query` against an already pinned `snapshot`.
    ///
    /// The cache is consulted and populated under the snapshot's generation,
    /// so a result computed against one generation is never served for
    /// another.
    pub fn execute_on(
        &self,
        snapshot: &Snapshot,
        query: &Query,
        context: &QueryContext,
    ) -> Result<Arc<QueryOutput>, QueryError> {
        let generation = snapshot.generation();
        let fingerprint = Fingerprint::of(query);
        match self.cache.get(&fingerprint, generation) {
            Ok(Some(hit)) => {
                debug!("cache hit for {fingerprint} at generation {generation}");
                return Ok(hit);
            }
            Ok(None) => debug!("cache miss for {fingerprint} at generation {generation}"),
            Err(err) => warn!("cache lookup for {fingerprint} failed: {err}"),
        }

        let config = self.engine.config();
        let output = Arc::new(snapshot.execute(query, config, &mut context.budget(config.limits))?);
        if let Err(err) = self.cache.put(fingerprint.clone(), generation, Arc::clone(&output)) {
            warn!("cache store for {fingerprint} failed: {err}");
        }
        Ok(output)
    }

    /// Drop every cached result.
    pub fn clear(&self) -> Result<usize, CacheError> {
        self.cache.clear()
    }
}
