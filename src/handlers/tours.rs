//! Tour endpoints: factory CRUD, the top-5 alias, reports and geo queries.

use crate::auth::Role;
use crate::config::ResourceKind;
use crate::error::AppError;
use crate::extractors::{CurrentUser, JsonBody, PathParams, QueryParams};
use crate::handlers::factory::{self, DocResponse, PageResponse, QueryPairs};
use crate::query::QuerySpec;
use crate::response::{self, Envelope};
use crate::service::reports::{self, DistanceUnit, GeoPoint};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

const TOUR_MANAGERS: &[Role] = &[Role::Admin, Role::LeadGuide];
const TOUR_STAFF: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];

type ValueResponse = (StatusCode, Json<Envelope<Value>>);

pub async fn get_all_tours(
    State(state): State<AppState>,
    QueryParams(pairs): QueryParams<QueryPairs>,
) -> Result<PageResponse, AppError> {
    factory::get_all(&state.resource(ResourceKind::Tours), "tours", pairs, Vec::new(), &[]).await
}

/// Five best-rated tours, cheapest first among equals.
pub async fn top_five_cheap(
    State(state): State<AppState>,
    QueryParams(pairs): QueryParams<QueryPairs>,
) -> Result<PageResponse, AppError> {
    let mut spec = QuerySpec::from_pairs(pairs);
    spec.set("limit", "5")
        .set("sort", "-ratingsAverage,price")
        .set("fields", "name,price,ratingsAverage,summary,difficulty");
    let page = state.resource(ResourceKind::Tours).list(&spec, &[]).await?;
    Ok(response::page("tours", page))
}

pub async fn get_tour(State(state): State<AppState>, PathParams(id): PathParams<String>) -> Result<DocResponse, AppError> {
    factory::get_one(&state.resource(ResourceKind::Tours), &id, &["reviews"]).await
}

pub async fn create_tour(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    user.require(TOUR_MANAGERS)?;
    factory::create_one(&state.resource(ResourceKind::Tours), body).await
}

pub async fn update_tour(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    user.require(TOUR_MANAGERS)?;
    factory::update_one(&state.resource(ResourceKind::Tours), &id, body).await
}

pub async fn delete_tour(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    user.require(TOUR_MANAGERS)?;
    factory::delete_one(&state.resource(ResourceKind::Tours), &id).await
}

pub async fn tour_stats(State(state): State<AppState>) -> Result<ValueResponse, AppError> {
    let tours = state.resource(ResourceKind::Tours).find_all(Vec::new()).await?;
    Ok(response::ok(json!({ "stats": reports::tour_stats(&tours) })))
}

pub async fn monthly_plan(
    State(state): State<AppState>,
    PathParams(year): PathParams<String>,
    user: CurrentUser,
) -> Result<ValueResponse, AppError> {
    user.require(TOUR_STAFF)?;
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid year: {}", year)))?;
    let tours = state.resource(ResourceKind::Tours).find_all(Vec::new()).await?;
    Ok(response::ok(json!({ "plan": reports::monthly_plan(&tours, year) })))
}

pub async fn tours_within(
    State(state): State<AppState>,
    PathParams((distance, latlng, unit)): PathParams<(String, String, String)>,
) -> Result<Json<Value>, AppError> {
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid distance: {}", distance)))?;
    let center = GeoPoint::parse(&latlng)?;
    let tours = state.resource(ResourceKind::Tours).find_all(Vec::new()).await?;
    let within = reports::tours_within(tours, center, distance, DistanceUnit::parse(&unit));
    Ok(Json(json!({ "status": "success", "results": within.len(), "data": { "tours": within } })))
}

pub async fn distances(
    State(state): State<AppState>,
    PathParams((latlng, unit)): PathParams<(String, String)>,
) -> Result<ValueResponse, AppError> {
    let origin = GeoPoint::parse(&latlng)?;
    let tours = state.resource(ResourceKind::Tours).find_all(Vec::new()).await?;
    Ok(response::ok(json!({ "distances": reports::distances(&tours, origin, DistanceUnit::parse(&unit)) })))
}
