//! Query engine owning the published dataset generation.
//!
//! The engine moves through `Empty → Ready(1) → Ready(2) → …`. A reload
//! builds the next [`Snapshot`] entirely off to the side and publishes it with
//! one atomic swap, so a query observes either the old generation or the new
//! one, never a mixture. Failed reloads leave the current generation in place.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use geo::{Coord, Rect};
use log::{info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    DatasetSource, Feature, NearestHit, QueryError, SearchBudget, SearchLimits, SpatialIndex,
    TagFilter,
    graph::{GraphBuilder, GraphConfig},
    routing::RoutePlan,
};

mod error;
mod query;
mod rooms;
mod snapshot;

pub use error::{ReloadError, ReloadStage};
pub use query::{DEFAULT_BUILDING_KIND, Query, QueryOutput};
pub use rooms::{BuildingSummary, RoomMatch};
pub use snapshot::Snapshot;

/// Monotonic dataset version. The first published dataset is generation 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Generation(pub u64);

impl Generation {
    /// Generation assigned to the first successful load.
    pub const FIRST: Self = Self(1);

    /// The generation following `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-wide tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Greatest distance, in plane units, at which a route endpoint snaps
    /// onto the graph.
    pub snap_radius: f64,
    /// Largest `k` accepted by nearest queries.
    pub max_k: usize,
    /// Per-query search limits.
    pub limits: SearchLimits,
    /// Graph derivation settings.
    pub graph: GraphConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snap_radius: 50.0,
            max_k: 100,
            limits: SearchLimits::default(),
            graph: GraphConfig::default(),
        }
    }
}

/// Exponential backoff for administrative reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Per-request context carrying the caller's cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: CancellationToken,
}

impl QueryContext {
    /// Context cancelled through `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// The cancellation token observed by searches.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start a budget bounded by `limits` and this context's token.
    pub fn budget(&self, limits: SearchLimits) -> SearchBudget {
        SearchBudget::new(limits, self.cancel.clone())
    }
}

/// Owns the current [`Snapshot`] and answers queries against it.
pub struct QueryEngine {
    config: EngineConfig,
    published: watch::Sender<Option<Arc<Snapshot>>>,
    reload_lock: Mutex<()>,
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Create an engine with no published generation.
    pub fn new(config: EngineConfig) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            config,
            published,
            reload_lock: Mutex::new(()),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Currently published generation, if any.
    pub fn generation(&self) -> Option<Generation> {
        self.published
            .borrow()
            .as_ref()
            .map(|snapshot| snapshot.generation)
    }

    /// Pin the current snapshot.
    ///
    /// Returns [`QueryError::NotReady`] before the first successful reload.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, QueryError> {
        self.published
            .borrow()
            .as_ref()
            .map(Arc::clone)
            .ok_or(QueryError::NotReady)
    }

    /// Load, index and graph `source`, then publish it as the next generation.
    ///
    /// Concurrent reloads are serialised; queries keep running against the
    /// current generation throughout.
    pub fn reload(&self, source: &dyn DatasetSource) -> Result<Generation, ReloadError> {
        let _serialised = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        let location = source.describe();
        info!("reloading dataset from {location}");

        let features = source.load()?;
        let index = SpatialIndex::build(features.features())?;
        let graph = GraphBuilder::new(self.config.graph).build(&features)?;

        let generation = self.generation().map_or(Generation::FIRST, Generation::next);
        let feature_count = features.len();
        let (nodes, edges) = (graph.node_count(), graph.edge_count());
        let snapshot = Arc::new(Snapshot {
            generation,
            features,
            index,
            graph,
        });
        self.published.send_replace(Some(snapshot));
        info!(
            "published generation {generation} from {location}: {feature_count} features, \
             {nodes} graph nodes, {edges} edges in {:?}",
            started.elapsed()
        );
        Ok(generation)
    }

    /// [`QueryEngine::reload`], retrying transient load failures with
    /// exponential backoff. Blocks the calling thread between attempts.
    pub fn reload_with_retry(
        &self,
        source: &dyn DatasetSource,
        policy: &RetryPolicy,
    ) -> Result<Generation, ReloadError> {
        let mut attempt = 1;
        loop {
            match self.reload(source) {
                Ok(generation) => return Ok(generation),
                Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!("reload attempt {attempt} failed: {err}; retrying in {delay:?}");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Wait until generation `target` or a later one is published.
    pub async fn wait_for_generation(&self, target: Generation) -> Result<Arc<Snapshot>, QueryError> {
        let mut receiver = self.published.subscribe();
        let published = receiver
            .wait_for(|current| {
                current
                    .as_ref()
                    .is_some_and(|snapshot| snapshot.generation >= target)
            })
            .await
            .map_err(|_| QueryError::NotReady)?;
        published.as_ref().map(Arc::clone).ok_or(QueryError::NotReady)
    }

    /// Pin the current snapshot and run `query` against it.
    pub fn execute(&self, query: &Query, context: &QueryContext) -> Result<QueryOutput, QueryError> {
        let snapshot = self.snapshot()?;
        snapshot.execute(query, &self.config, &mut context.budget(self.config.limits))
    }

    /// The `k` features closest to `point`, optionally filtered by tags.
    pub fn nearest_feature(
        &self,
        point: Coord<f64>,
        k: usize,
        filter: &TagFilter,
        context: &QueryContext,
    ) -> Result<Vec<NearestHit>, QueryError> {
        self.snapshot()?.nearest(
            point,
            k,
            filter,
            self.config.max_k,
            &mut context.budget(self.config.limits),
        )
    }

    /// Cheapest walking route from `from` to `to`.
    pub fn route(
        &self,
        from: Coord<f64>,
        to: Coord<f64>,
        context: &QueryContext,
    ) -> Result<RoutePlan, QueryError> {
        self.snapshot()?.route(
            from,
            to,
            self.config.snap_radius,
            &mut context.budget(self.config.limits),
        )
    }

    /// Features intersecting `bbox`.
    pub fn bounding_box(
        &self,
        bbox: &Rect<f64>,
        filter: &TagFilter,
    ) -> Result<Vec<Arc<Feature>>, QueryError> {
        self.snapshot()?.within(bbox, filter)
    }

    /// A room inside a named building.
    pub fn find_room(
        &self,
        building: &str,
        room: &str,
        context: &QueryContext,
    ) -> Result<RoomMatch, QueryError> {
        self.snapshot()?
            .find_room(building, room, &mut context.budget(self.config.limits))
    }

    /// Buildings tagged `building=<kind>`.
    pub fn buildings(&self, kind: &str) -> Result<Vec<BuildingSummary>, QueryError> {
        Ok(self.snapshot()?.buildings(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FeatureId, FeatureSet, Geometry, Projection, SourceError, Tags,
        test_support::{ScriptedSource, SourceStep, square_campus},
    };
    use rstest::rstest;

    #[rstest]
    fn queries_fail_before_first_load() {
        let engine = QueryEngine::new(EngineConfig::default());
        assert_eq!(engine.generation(), None);
        assert!(matches!(engine.snapshot(), Err(QueryError::NotReady)));
        assert_eq!(
            engine.buildings(DEFAULT_BUILDING_KIND),
            Err(QueryError::NotReady)
        );
    }

    #[rstest]
    fn generations_increase_by_one() {
        let engine = QueryEngine::new(EngineConfig::default());
        let source = ScriptedSource::repeating(square_campus());
        assert_eq!(engine.reload(&source).expect("first"), Generation(1));
        assert_eq!(engine.reload(&source).expect("second"), Generation(2));
        assert_eq!(engine.generation(), Some(Generation(2)));
    }

    #[rstest]
    fn failed_reload_keeps_previous_generation() {
        let engine = QueryEngine::new(EngineConfig::default());
        let source = ScriptedSource::new(vec![
            SourceStep::Load(square_campus()),
            SourceStep::ParseFailure,
        ]);
        engine.reload(&source).expect("first");
        let pinned = engine.snapshot().expect("ready");
        let err = engine.reload(&source).expect_err("parse failure");
        assert_eq!(err.stage(), ReloadStage::Load);
        assert!(matches!(err, ReloadError::Load(SourceError::Parse { .. })));
        let current = engine.snapshot().expect("still ready");
        assert!(Arc::ptr_eq(&pinned, &current));
    }

    #[rstest]
    fn pinned_snapshot_survives_reload() {
        let engine = QueryEngine::new(EngineConfig::default());
        let source = ScriptedSource::repeating(square_campus());
        engine.reload(&source).expect("first");
        let pinned = engine.snapshot().expect("ready");
        engine.reload(&source).expect("second");
        assert_eq!(pinned.generation(), Generation(1));
        assert_eq!(engine.snapshot().expect("ready").generation(), Generation(2));
    }

    #[rstest]
    fn retry_recovers_from_transient_failures() {
        let engine = QueryEngine::new(EngineConfig::default());
        let source = ScriptedSource::new(vec![
            SourceStep::IoFailure,
            SourceStep::IoFailure,
            SourceStep::Load(square_campus()),
        ]);
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        assert_eq!(
            engine.reload_with_retry(&source, &policy).expect("third attempt"),
            Generation(1)
        );
        assert_eq!(source.loads(), 3);
    }

    #[rstest]
    fn retry_does_not_repeat_parse_failures() {
        let engine = QueryEngine::new(EngineConfig::default());
        let source = ScriptedSource::new(vec![SourceStep::ParseFailure]);
        let err = engine
            .reload_with_retry(&source, &RetryPolicy::default())
            .expect_err("parse failure");
        assert!(!err.is_transient());
        assert_eq!(source.loads(), 1);
    }

    #[rstest]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
    }

    #[rstest]
    fn invalid_geometry_fails_at_index_stage() {
        use crate::{Feature, FeatureId, FeatureSet, Geometry, Tags};

        let engine = QueryEngine::new(EngineConfig::default());
        let broken = FeatureSet::new(
            vec![Feature::new(
                FeatureId(1),
                Geometry::Point(Coord { x: f64::NAN, y: 0.0 }),
                Tags::new(),
            )],
            Projection::Planar,
        );
        let err = engine
            .reload(&ScriptedSource::repeating(broken))
            .expect_err("invalid geometry");
        assert_eq!(err.stage(), ReloadStage::Index);
        assert_eq!(engine.generation(), None);
    }

    #[rstest]
    fn route_rejects_endpoints_beyond_snap_radius() {
        let engine = QueryEngine::new(EngineConfig {
            snap_radius: 1.0,
            ..EngineConfig::default()
        });
        engine
            .reload(&ScriptedSource::repeating(square_campus()))
            .expect("load");
        let err = engine
            .route(
                Coord { x: 5.0, y: 5.0 },
                Coord { x: 10.0, y: 10.0 },
                &QueryContext::default(),
            )
            .expect_err("too far");
        assert!(matches!(
            err,
            QueryError::UnreachablePoint {
                endpoint: crate::Endpoint::From,
                ..
            }
        ));
    }

    #[rstest]
    fn cancelled_context_aborts_route() {
        let engine = QueryEngine::new(EngineConfig::default());
        engine
            .reload(&ScriptedSource::repeating(square_campus()))
            .expect("load");
        let token = CancellationToken::new();
        token.cancel();
        let err = engine
            .route(
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 10.0, y: 10.0 },
                &QueryContext::new(token),
            )
            .expect_err("cancelled");
        assert_eq!(err, QueryError::Cancelled);
    }

    fn many_markers() -> FeatureSet {
        FeatureSet::new(
            (1..=150_u32).map(|id| {
                Feature::new(
                    FeatureId(u64::from(id)),
                    Geometry::Point(Coord {
                        x: f64::from(id),
                        y: 0.0,
                    }),
                    Tags::new(),
                )
            }),
            Projection::Planar,
        )
    }

    #[rstest]
    #[case(0, 0)]
    #[case(3, 3)]
    #[case(100, 100)]
    #[case(120, 100)]
    fn nearest_clamps_k_to_the_configured_maximum(#[case] k: usize, #[case] expected: usize) {
        let engine = QueryEngine::new(EngineConfig::default());
        engine
            .reload(&ScriptedSource::repeating(many_markers()))
            .expect("load");
        let hits = engine
            .nearest_feature(
                Coord { x: 0.0, y: 0.0 },
                k,
                &TagFilter::any(),
                &QueryContext::default(),
            )
            .expect("nearest");
        assert_eq!(hits.len(), expected);
        let ids: Vec<FeatureId> = hits.iter().map(|hit| hit.feature.id).collect();
        let expected_ids: Vec<FeatureId> = (1..=150).map(FeatureId).take(expected).collect();
        assert_eq!(ids, expected_ids);
    }

    #[tokio::test]
    async fn waiting_for_a_generation_resolves_after_reload() {
        let engine = Arc::new(QueryEngine::new(EngineConfig::default()));
        let waiter = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .wait_for_generation(Generation(1))
                    .await
                    .map(|snapshot| snapshot.generation())
            })
        };
        tokio::task::yield_now().await;
        engine
            .reload(&ScriptedSource::repeating(square_campus()))
            .expect("load");
        assert_eq!(waiter.await.expect("join"), Ok(Generation(1)));
    }
}
