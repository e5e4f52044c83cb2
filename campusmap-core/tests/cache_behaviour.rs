//! Behavioural tests for the cache in front of the query engine.

use std::{cell::RefCell, num::NonZeroUsize, sync::Arc};

use campusmap_core::{
    cache::{CacheBackend, CachedEngine},
    engine::{Query, QueryContext, QueryOutput},
    test_support::{ScriptedSource, campus_engine, square_campus},
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[fixture]
fn cached() -> RefCell<Option<CachedEngine>> {
    RefCell::new(None)
}

#[fixture]
fn answers() -> RefCell<Vec<Arc<QueryOutput>>> {
    RefCell::new(Vec::new())
}

fn list_buildings(cached: &RefCell<Option<CachedEngine>>, answers: &RefCell<Vec<Arc<QueryOutput>>>) {
    let query = Query::Buildings {
        kind: "university".into(),
    };
    let answer = cached
        .borrow()
        .as_ref()
        .expect("engine ready")
        .execute(&query, &QueryContext::default())
        .expect("buildings");
    answers.borrow_mut().push(answer);
}

#[given("a campus engine behind a memory cache")]
fn given_cached_engine(#[from(cached)] cached: &RefCell<Option<CachedEngine>>) {
    let backend = CacheBackend::from_url("memory://").expect("backend");
    let capacity = NonZeroUsize::new(8).expect("non-zero");
    *cached.borrow_mut() = Some(CachedEngine::new(
        Arc::new(campus_engine()),
        backend.build(capacity).expect("memory cache"),
    ));
}

#[when("I list university buildings twice")]
fn when_listed_twice(
    #[from(cached)] cached: &RefCell<Option<CachedEngine>>,
    #[from(answers)] answers: &RefCell<Vec<Arc<QueryOutput>>>,
) {
    list_buildings(cached, answers);
    list_buildings(cached, answers);
}

#[when("I list university buildings")]
fn when_listed(
    #[from(cached)] cached: &RefCell<Option<CachedEngine>>,
    #[from(answers)] answers: &RefCell<Vec<Arc<QueryOutput>>>,
) {
    list_buildings(cached, answers);
}

#[when("the dataset is reloaded without buildings")]
fn when_reloaded(#[from(cached)] cached: &RefCell<Option<CachedEngine>>) {
    cached
        .borrow()
        .as_ref()
        .expect("engine ready")
        .engine()
        .reload(&ScriptedSource::repeating(square_campus()))
        .expect("reload");
}

#[then("both answers are the same cached result")]
fn then_same(#[from(answers)] answers: &RefCell<Vec<Arc<QueryOutput>>>) {
    let answers = answers.borrow();
    let [first, second] = answers.as_slice() else {
        panic!("expected two answers, got {}", answers.len());
    };
    assert!(Arc::ptr_eq(first, second));
}

#[then("the latest answer lists no buildings")]
fn then_empty(#[from(answers)] answers: &RefCell<Vec<Arc<QueryOutput>>>) {
    let answers = answers.borrow();
    let latest = answers.last().expect("an answer");
    assert_eq!(**latest, QueryOutput::Buildings(Vec::new()));
    assert_eq!(answers.len(), 2);
}

#[scenario(path = "tests/features/cache.feature", index = 0)]
fn repeated_queries(
    cached: RefCell<Option<CachedEngine>>,
    answers: RefCell<Vec<Arc<QueryOutput>>>,
) {
    let _ = (cached, answers);
}

#[scenario(path = "tests/features/cache.feature", index = 1)]
fn reload_invalidates(
    cached: RefCell<Option<CachedEngine>>,
    answers: RefCell<Vec<Arc<QueryOutput>>>,
) {
    let _ = (cached, answers);
}
