//! Small in-memory datasets and scripted sources used by unit and behaviour
//! tests across the workspace.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use geo::{Coord, LineString, polygon};

use crate::{
    DatasetSource, Feature, FeatureId, FeatureSet, Geometry, Projection, SourceError, Tags,
    engine::{EngineConfig, QueryEngine},
    graph::{Graph, GraphBuilder},
};

/// Kind bit marking way-derived identifiers.
const WAY_BIT: u64 = 1 << 62;

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn marker(id: u64, name: &str, x: f64, y: f64) -> Feature {
    Feature::new(
        FeatureId(id),
        Geometry::Point(Coord { x, y }),
        tags(&[("amenity", "marker"), ("name", name)]),
    )
}

fn footway(id: u64, from: (f64, f64), to: (f64, f64)) -> Feature {
    Feature::new(
        FeatureId(WAY_BIT | id),
        Geometry::Polyline(LineString::from(vec![from, to])),
        tags(&[("highway", "footway")]),
    )
}

/// The four corners `A(0,0)`, `B(0,10)`, `C(10,10)`, `D(10,0)` as named
/// point features with ids 1 to 4.
pub fn square_markers() -> Vec<Feature> {
    vec![
        marker(1, "A", 0.0, 0.0),
        marker(2, "B", 0.0, 10.0),
        marker(3, "C", 10.0, 10.0),
        marker(4, "D", 10.0, 0.0),
    ]
}

/// Footways joining the square's corners in the order A-B, B-C, C-D, D-A.
pub fn square_paths() -> Vec<Feature> {
    vec![
        footway(1, (0.0, 0.0), (0.0, 10.0)),
        footway(2, (0.0, 10.0), (10.0, 10.0)),
        footway(3, (10.0, 10.0), (10.0, 0.0)),
        footway(4, (10.0, 0.0), (0.0, 0.0)),
    ]
}

/// Square corners and paths on the identity projection.
pub fn square_campus() -> FeatureSet {
    FeatureSet::new(
        square_markers().into_iter().chain(square_paths()),
        Projection::Planar,
    )
}

/// Routing graph of `set` under the default configuration.
///
/// # Panics
/// Panics when the graph cannot be built.
#[expect(clippy::expect_used, reason = "fixtures should fail fast during setup")]
pub fn square_graph(set: &FeatureSet) -> Graph {
    GraphBuilder::default().build(set).expect("fixture graph")
}

/// The square plus a university building holding room `G.01`, a detached
/// room `X.99` and an unrelated retail building.
pub fn campus_features() -> FeatureSet {
    let hall = Feature::new(
        FeatureId(WAY_BIT | 10),
        Geometry::Polygon(polygon![
            (x: 1.0, y: 1.0),
            (x: 6.0, y: 1.0),
            (x: 6.0, y: 6.0),
            (x: 1.0, y: 6.0),
        ]),
        tags(&[("building", "university"), ("name", "Main Hall")]),
    );
    let inside = Feature::new(
        FeatureId(WAY_BIT | 11),
        Geometry::Polygon(polygon![
            (x: 2.0, y: 2.0),
            (x: 3.0, y: 2.0),
            (x: 3.0, y: 3.0),
            (x: 2.0, y: 3.0),
        ]),
        tags(&[("indoor", "room"), ("ref", "G.01")]),
    );
    let outside = Feature::new(
        FeatureId(20),
        Geometry::Point(Coord { x: 8.0, y: 8.0 }),
        tags(&[("indoor", "room"), ("ref", "X.99")]),
    );
    let shop = Feature::new(
        FeatureId(WAY_BIT | 12),
        Geometry::Polygon(polygon![
            (x: 7.0, y: 7.0),
            (x: 9.0, y: 7.0),
            (x: 9.0, y: 9.0),
            (x: 7.0, y: 9.0),
        ]),
        tags(&[("building", "retail"), ("name", "Campus Shop")]),
    );
    FeatureSet::new(
        square_markers()
            .into_iter()
            .chain(square_paths())
            .chain([hall, inside, outside, shop]),
        Projection::Planar,
    )
}

/// An engine with [`campus_features`] published as generation 1.
///
/// # Panics
/// Panics when the fixture fails to load.
#[expect(clippy::expect_used, reason = "fixtures should fail fast during setup")]
pub fn campus_engine() -> QueryEngine {
    let engine = QueryEngine::new(EngineConfig::default());
    engine
        .reload(&ScriptedSource::repeating(campus_features()))
        .expect("fixture engine");
    engine
}

/// One scripted outcome of [`ScriptedSource::load`].
#[derive(Debug, Clone)]
pub enum SourceStep {
    /// Return the feature set.
    Load(FeatureSet),
    /// Fail with a transient I/O error.
    IoFailure,
    /// Fail with a permanent parse error.
    ParseFailure,
}

/// [`DatasetSource`] replaying scripted outcomes; the last step repeats once
/// the script is exhausted.
#[derive(Debug)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<SourceStep>>,
    loads: AtomicUsize,
}

impl ScriptedSource {
    /// Replay `steps` in order.
    pub fn new(steps: impl IntoIterator<Item = SourceStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Always return `set`.
    pub fn repeating(set: FeatureSet) -> Self {
        Self::new([SourceStep::Load(set)])
    }

    /// Number of `load` calls so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl DatasetSource for ScriptedSource {
    fn load(&self) -> Result<FeatureSet, SourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().unwrap_or_else(PoisonError::into_inner);
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };
        match step {
            Some(SourceStep::Load(set)) => Ok(set),
            Some(SourceStep::IoFailure) | None => Err(SourceError::Io {
                location: self.describe(),
                source: io::Error::new(io::ErrorKind::Interrupted, "scripted failure"),
            }),
            Some(SourceStep::ParseFailure) => Err(SourceError::Parse {
                location: self.describe(),
                message: "scripted parse failure".to_owned(),
            }),
        }
    }

    fn describe(&self) -> String {
        "scripted source".to_owned()
    }
}
