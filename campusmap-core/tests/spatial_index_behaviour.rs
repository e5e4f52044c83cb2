//! Behavioural tests for nearest and bounding-box queries.

use std::{cell::RefCell, sync::Arc};

use campusmap_core::{
    FeatureId, SearchBudget, SpatialIndex, TagFilter, test_support::square_markers,
};
use geo::{Coord, Rect};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[fixture]
fn index() -> RefCell<Option<SpatialIndex>> {
    RefCell::new(None)
}

#[fixture]
fn results() -> RefCell<Vec<(FeatureId, f64)>> {
    RefCell::new(Vec::new())
}

fn built(index: &RefCell<Option<SpatialIndex>>) -> std::cell::Ref<'_, SpatialIndex> {
    std::cell::Ref::map(index.borrow(), |index| index.as_ref().expect("index built"))
}

#[given("the four corners of a ten metre square")]
fn given_square(#[from(index)] index: &RefCell<Option<SpatialIndex>>) {
    let features: Vec<_> = square_markers().into_iter().map(Arc::new).collect();
    *index.borrow_mut() = Some(SpatialIndex::build(&features).expect("index"));
}

#[given("an extract with no features")]
fn given_empty(#[from(index)] index: &RefCell<Option<SpatialIndex>>) {
    *index.borrow_mut() = Some(SpatialIndex::build(&[]).expect("index"));
}

#[when("I query the nearest features to {x}, {y} with k = {k}")]
fn when_nearest(
    #[from(index)] index: &RefCell<Option<SpatialIndex>>,
    #[from(results)] results: &RefCell<Vec<(FeatureId, f64)>>,
    x: f64,
    y: f64,
    k: usize,
) {
    let hits = built(index)
        .nearest(Coord { x, y }, k, &TagFilter::any(), &mut SearchBudget::unlimited())
        .expect("query");
    *results.borrow_mut() = hits
        .into_iter()
        .map(|hit| (hit.feature.id, hit.distance))
        .collect();
}

#[when("I ask for the features within {min_x}, {min_y} and {max_x}, {max_y}")]
fn when_within(
    #[from(index)] index: &RefCell<Option<SpatialIndex>>,
    #[from(results)] results: &RefCell<Vec<(FeatureId, f64)>>,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
) {
    let bbox = Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y });
    *results.borrow_mut() = built(index)
        .within(&bbox, &TagFilter::any())
        .into_iter()
        .map(|feature| (feature.id, 0.0))
        .collect();
}

#[then("feature {id} is returned at a distance of {distance}")]
fn then_single(
    #[from(results)] results: &RefCell<Vec<(FeatureId, f64)>>,
    id: u64,
    distance: f64,
) {
    let results = results.borrow();
    assert_eq!(results.len(), 1, "expected exactly one hit");
    let (found, measured) = results.first().copied().expect("one hit");
    assert_eq!(found, FeatureId(id));
    assert!((measured - distance).abs() < 1e-6, "distance was {measured}");
}

#[then("features {first} and {second} are returned in that order")]
fn then_pair(
    #[from(results)] results: &RefCell<Vec<(FeatureId, f64)>>,
    first: u64,
    second: u64,
) {
    let ids: Vec<FeatureId> = results.borrow().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![FeatureId(first), FeatureId(second)]);
}

#[then("no features are returned")]
fn then_none(#[from(results)] results: &RefCell<Vec<(FeatureId, f64)>>) {
    assert!(results.borrow().is_empty(), "expected no hits");
}

#[scenario(path = "tests/features/spatial_index.feature", index = 0)]
fn nearest_corner(index: RefCell<Option<SpatialIndex>>, results: RefCell<Vec<(FeatureId, f64)>>) {
    let _ = (index, results);
}

#[scenario(path = "tests/features/spatial_index.feature", index = 1)]
fn equidistant_corners(
    index: RefCell<Option<SpatialIndex>>,
    results: RefCell<Vec<(FeatureId, f64)>>,
) {
    let _ = (index, results);
}

#[scenario(path = "tests/features/spatial_index.feature", index = 2)]
fn bbox_edges(index: RefCell<Option<SpatialIndex>>, results: RefCell<Vec<(FeatureId, f64)>>) {
    let _ = (index, results);
}

#[scenario(path = "tests/features/spatial_index.feature", index = 3)]
fn empty_extract(index: RefCell<Option<SpatialIndex>>, results: RefCell<Vec<(FeatureId, f64)>>) {
    let _ = (index, results);
}
