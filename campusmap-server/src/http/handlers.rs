//! Route handlers.
//!
//! Queries run on the blocking pool against a snapshot pinned before the
//! query is built, so the coordinates going in and coming out use the same
//! projection. Dropping a request cancels its search.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use campusmap_core::{
    QueryError, TagFilter,
    engine::{BuildingSummary, DEFAULT_BUILDING_KIND, Query as EngineQuery, QueryContext, QueryOutput, Snapshot},
};
use geo::{Coord, Rect};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    AppState,
    dto::{
        BuildingsParams, ClearedBody, FeatureBody, FeaturesParams, FindRoomParams, GenerationBody,
        NearestBody, NearestParams, RoomBody, RouteBody, RouteParams,
    },
    error::ApiError,
};

/// Results returned when `k` is omitted.
const DEFAULT_K: usize = 1;

type Params<T> = Result<Query<T>, QueryRejection>;

async fn execute(
    state: &AppState,
    build: impl FnOnce(&Snapshot) -> EngineQuery,
) -> Result<(Arc<Snapshot>, Arc<QueryOutput>), ApiError> {
    let snapshot = state.cached.engine().snapshot()?;
    let query = build(&snapshot);
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let context = QueryContext::new(cancel);
    let cached = state.cached.clone();
    let pinned = Arc::clone(&snapshot);
    let output =
        tokio::task::spawn_blocking(move || cached.execute_on(&pinned, &query, &context)).await??;
    Ok((snapshot, output))
}

fn wgs84(lat: f64, lon: f64) -> Result<Coord<f64>, ApiError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::BadRequest(format!(
            "latitude {lat} is outside [-90, 90]"
        )));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::BadRequest(format!(
            "longitude {lon} is outside [-180, 180]"
        )));
    }
    Ok(Coord { x: lon, y: lat })
}

fn parse_filter(tag: Option<&str>) -> Result<TagFilter, ApiError> {
    Ok(tag.unwrap_or_default().parse::<TagFilter>()?)
}

/// Parse `minlat,minlon,maxlat,maxlon` into a WGS84 rectangle.
fn parse_bbox(raw: &str) -> Result<Rect<f64>, ApiError> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ApiError::BadRequest(format!("bbox: {err}")))?;
    let [min_lat, min_lon, max_lat, max_lon] = values[..] else {
        return Err(ApiError::BadRequest(format!(
            "bbox needs 4 values (minlat,minlon,maxlat,maxlon), got {}",
            values.len()
        )));
    };
    let min = wgs84(min_lat, min_lon)?;
    let max = wgs84(max_lat, max_lon)?;
    if min.x > max.x || min.y > max.y {
        return Err(ApiError::BadRequest(
            "bbox minimum exceeds its maximum".to_owned(),
        ));
    }
    Ok(Rect::new(min, max))
}

pub(super) async fn nearest(
    State(state): State<Arc<AppState>>,
    params: Params<NearestParams>,
) -> Result<Json<Vec<NearestBody>>, ApiError> {
    let Query(params) = params?;
    let point = wgs84(params.lat, params.lon)?;
    let filter = parse_filter(params.tag.as_deref())?;
    let k = params.k.unwrap_or(DEFAULT_K);
    let max_k = state.cached.engine().config().max_k;
    if k == 0 || k > max_k {
        return Err(QueryError::InvalidArgument {
            message: format!("k must be between 1 and {max_k}, got {k}"),
        }
        .into());
    }
    let (snapshot, output) = execute(&state, |snapshot| EngineQuery::Nearest {
        point: snapshot.projection().forward(point),
        k,
        filter,
    })
    .await?;
    let QueryOutput::Nearest(hits) = output.as_ref() else {
        return Err(ApiError::Internal("nearest"));
    };
    let projection = snapshot.projection();
    Ok(Json(
        hits.iter()
            .map(|hit| NearestBody {
                feature: FeatureBody::new(&hit.feature, projection),
                distance_m: hit.distance,
            })
            .collect(),
    ))
}

pub(super) async fn route(
    State(state): State<Arc<AppState>>,
    params: Params<RouteParams>,
) -> Result<Json<RouteBody>, ApiError> {
    let Query(params) = params?;
    let from = wgs84(params.from_lat, params.from_lon)?;
    let to = wgs84(params.to_lat, params.to_lon)?;
    let (snapshot, output) = execute(&state, |snapshot| {
        let projection = snapshot.projection();
        EngineQuery::Route {
            from: projection.forward(from),
            to: projection.forward(to),
        }
    })
    .await?;
    let QueryOutput::Route(plan) = output.as_ref() else {
        return Err(ApiError::Internal("route"));
    };
    let projection = snapshot.projection();
    Ok(Json(RouteBody {
        path: plan
            .path
            .iter()
            .map(|coord| {
                let position = projection.inverse(*coord);
                [position.y, position.x]
            })
            .collect(),
        distance_m: plan.distance,
        generation: snapshot.generation(),
    }))
}

pub(super) async fn features(
    State(state): State<Arc<AppState>>,
    params: Params<FeaturesParams>,
) -> Result<Json<Vec<FeatureBody>>, ApiError> {
    let Query(params) = params?;
    let bbox = parse_bbox(&params.bbox)?;
    let filter = parse_filter(params.tag.as_deref())?;
    let (snapshot, output) = execute(&state, |snapshot| EngineQuery::Within {
        bbox: snapshot.projection().forward_rect(bbox),
        filter,
    })
    .await?;
    let QueryOutput::Features(found) = output.as_ref() else {
        return Err(ApiError::Internal("bbox"));
    };
    let projection = snapshot.projection();
    Ok(Json(
        found
            .iter()
            .map(|feature| FeatureBody::new(feature, projection))
            .collect(),
    ))
}

pub(super) async fn find_room(
    State(state): State<Arc<AppState>>,
    params: Params<FindRoomParams>,
) -> Result<Json<RoomBody>, ApiError> {
    let Query(params) = params?;
    let (snapshot, output) = execute(&state, |_| EngineQuery::FindRoom {
        building: params.building,
        room: params.room,
    })
    .await?;
    let QueryOutput::Room(found) = output.as_ref() else {
        return Err(ApiError::Internal("find_room"));
    };
    Ok(Json(RoomBody::new(found, snapshot.projection())))
}

pub(super) async fn buildings(
    State(state): State<Arc<AppState>>,
    params: Params<BuildingsParams>,
) -> Result<Json<Vec<BuildingSummary>>, ApiError> {
    let Query(params) = params?;
    let kind = params
        .kind
        .filter(|kind| !kind.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BUILDING_KIND.to_owned());
    let (_, output) = execute(&state, |_| EngineQuery::Buildings { kind }).await?;
    let QueryOutput::Buildings(list) = output.as_ref() else {
        return Err(ApiError::Internal("buildings"));
    };
    Ok(Json(list.clone()))
}

pub(super) async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GenerationBody>, ApiError> {
    let generation = state
        .cached
        .engine()
        .generation()
        .ok_or(QueryError::NotReady)?;
    Ok(Json(GenerationBody { generation }))
}

pub(super) async fn reload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GenerationBody>, ApiError> {
    let worker = Arc::clone(&state);
    let generation = tokio::task::spawn_blocking(move || {
        worker
            .cached
            .engine()
            .reload_with_retry(worker.source.as_ref(), &worker.retry)
    })
    .await??;
    let snapshot = state.cached.engine().wait_for_generation(generation).await?;
    info!(generation = %snapshot.generation(), "reload published");
    Ok(Json(GenerationBody {
        generation: snapshot.generation(),
    }))
}

pub(super) async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearedBody> {
    let body = match state.cached.clear() {
        Ok(entries) => {
            info!(entries, "cache cleared");
            ClearedBody {
                cleared: true,
                entries,
            }
        }
        Err(err) => {
            warn!(%err, "cache clear failed");
            ClearedBody {
                cleared: false,
                entries: 0,
            }
        }
    };
    Json(body)
}
