//! Review endpoints, top-level and nested under a tour. Every successful write is followed by
//! a recompute of the tour's rating aggregates.

use crate::auth::Role;
use crate::config::ResourceKind;
use crate::error::AppError;
use crate::extractors::{CurrentUser, JsonBody, PathParams, QueryParams};
use crate::handlers::factory::{self, DocResponse, PageResponse, QueryPairs};
use crate::query::Condition;
use crate::response;
use crate::service::{parse_id, ratings};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode};
use serde_json::Value;

fn tour_of(review: &Value) -> Option<String> {
    review.get("tour").and_then(Value::as_str).map(str::to_string)
}

async fn refresh_ratings(state: &AppState, tour_id: &str) -> Result<(), AppError> {
    ratings::recalculate_tour_ratings(
        &state.resource(ResourceKind::Reviews),
        &state.resource(ResourceKind::Tours),
        tour_id,
    )
    .await
}

/// Review as stored, after checking the caller wrote it (admins may touch any review).
async fn owned_review(state: &AppState, id: &str, user: &CurrentUser) -> Result<Value, AppError> {
    let review = state.resource(ResourceKind::Reviews).get_one(id, &[]).await?;
    let owner = review.get("user").and_then(Value::as_str);
    if user.role != Role::Admin && owner != Some(user.id.as_str()) {
        return Err(AppError::Forbidden("You can only change your own reviews".into()));
    }
    Ok(review)
}

pub async fn get_all_reviews(
    State(state): State<AppState>,
    QueryParams(pairs): QueryParams<QueryPairs>,
) -> Result<PageResponse, AppError> {
    factory::get_all(&state.resource(ResourceKind::Reviews), "reviews", pairs, Vec::new(), &["user"]).await
}

pub async fn get_tour_reviews(
    State(state): State<AppState>,
    PathParams(tour_id): PathParams<String>,
    QueryParams(pairs): QueryParams<QueryPairs>,
) -> Result<PageResponse, AppError> {
    let tour_id = parse_id(&tour_id)?;
    let scope = vec![Condition::eq("tour", Value::String(tour_id))];
    factory::get_all(&state.resource(ResourceKind::Reviews), "reviews", pairs, scope, &["user"]).await
}

pub async fn create_review(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    write_review(&state, &user, None, body).await
}

pub async fn create_tour_review(
    State(state): State<AppState>,
    PathParams(tour_id): PathParams<String>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    let tour_id = parse_id(&tour_id)?;
    write_review(&state, &user, Some(tour_id), body).await
}

/// Only regular users review; `tour` defaults to the path tour and `user` to the caller.
async fn write_review(
    state: &AppState,
    user: &CurrentUser,
    path_tour: Option<String>,
    body: Value,
) -> Result<DocResponse, AppError> {
    user.require(&[Role::User])?;
    let Value::Object(mut body) = body else {
        return Err(AppError::BadRequest("Request body must be a JSON object".into()));
    };
    if let Some(tour) = path_tour {
        body.entry("tour").or_insert(Value::String(tour));
    }
    body.entry("user").or_insert(Value::String(user.id.clone()));

    let tour_id = body
        .get("tour")
        .and_then(Value::as_str)
        .map(parse_id)
        .transpose()?
        .ok_or_else(|| AppError::Validation("Invalid input data. tour is required".into()))?;
    require_tour(state, &tour_id).await?;

    let review = state.resource(ResourceKind::Reviews).create_one(Value::Object(body)).await?;
    refresh_ratings(state, &tour_id).await?;
    Ok(response::doc_created(review))
}

async fn require_tour(state: &AppState, tour_id: &str) -> Result<(), AppError> {
    match state.resource(ResourceKind::Tours).find_raw(tour_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound("No tour found with that ID".into())),
    }
}

pub async fn get_review(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> Result<DocResponse, AppError> {
    factory::get_one(&state.resource(ResourceKind::Reviews), &id, &["user", "tour"]).await
}

pub async fn update_review(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    let before = owned_review(&state, &id, &user).await?;
    let mut body = body;
    if user.role != Role::Admin {
        if let Some(map) = body.as_object_mut() {
            map.remove("user");
            map.remove("tour");
        }
    }
    if let Some(tour) = body.get("tour").and_then(Value::as_str) {
        require_tour(&state, &parse_id(tour)?).await?;
    }
    let reviews = state.resource(ResourceKind::Reviews);
    let updated = reviews.update_one(&id, body).await?;
    let mut tours: Vec<String> = tour_of(&before).into_iter().chain(tour_of(&updated)).collect();
    tours.dedup();
    for tour in tours {
        refresh_ratings(&state, &tour).await?;
    }
    Ok(response::doc_ok(updated))
}

pub async fn delete_review(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    owned_review(&state, &id, &user).await?;
    let removed = state.resource(ResourceKind::Reviews).delete_one(&id).await?;
    if let Some(tour) = tour_of(&removed) {
        refresh_ratings(&state, &tour).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
