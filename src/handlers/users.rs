//! The caller's own account and admin user management.

use crate::auth::Role;
use crate::config::ResourceKind;
use crate::error::AppError;
use crate::extractors::{CurrentUser, JsonBody, PathParams, QueryParams};
use crate::handlers::factory::{self, DocResponse, PageResponse, QueryPairs};
use crate::query::Condition;
use crate::response;
use crate::state::AppState;
use crate::store::Document;
use axum::{extract::State, http::StatusCode};
use serde_json::{Map, Value};

const SELF_EDITABLE: &[&str] = &["name", "email"];

pub async fn get_me(State(state): State<AppState>, user: CurrentUser) -> Result<DocResponse, AppError> {
    factory::get_one(&state.resource(ResourceKind::Users), &user.id, &[]).await
}

pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    let Value::Object(body) = body else {
        return Err(AppError::BadRequest("Request body must be a JSON object".into()));
    };
    if body.contains_key("password") || body.contains_key("passwordConfirm") {
        return Err(AppError::BadRequest(
            "This route is not for password updates. Please use /updateMyPassword.".into(),
        ));
    }
    let filtered: Map<String, Value> = body
        .into_iter()
        .filter(|(k, _)| SELF_EDITABLE.contains(&k.as_str()))
        .collect();
    let updated = state
        .resource(ResourceKind::Users)
        .update_one(&user.id, Value::Object(filtered))
        .await?;
    Ok(response::ok(response::keyed("user", updated)))
}

/// Deactivate rather than delete; the account's sessions end here.
pub async fn delete_me(State(state): State<AppState>, user: CurrentUser) -> Result<StatusCode, AppError> {
    let mut patch = Document::new();
    patch.insert("active".into(), Value::Bool(false));
    state.resource(ResourceKind::Users).patch_raw(&user.id, patch).await?;
    state.sessions.revoke_user(&user.id);
    tracing::info!(user = %user.id, "user deactivated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_all_users(
    State(state): State<AppState>,
    user: CurrentUser,
    QueryParams(pairs): QueryParams<QueryPairs>,
) -> Result<PageResponse, AppError> {
    user.require(&[Role::Admin])?;
    let scope = vec![Condition::eq("active", Value::Bool(true))];
    factory::get_all(&state.resource(ResourceKind::Users), "users", pairs, scope, &[]).await
}

pub async fn create_user(user: CurrentUser) -> Result<StatusCode, AppError> {
    user.require(&[Role::Admin])?;
    Err(AppError::BadRequest("This route is not defined! Please use /signup instead".into()))
}

pub async fn get_user(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
) -> Result<DocResponse, AppError> {
    user.require(&[Role::Admin])?;
    factory::get_one(&state.resource(ResourceKind::Users), &id, &[]).await
}

/// Admin edits go through the factory, so password fields stay out of reach.
pub async fn update_user(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    user.require(&[Role::Admin])?;
    factory::update_one(&state.resource(ResourceKind::Users), &id, body).await
}

pub async fn delete_user(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    user.require(&[Role::Admin])?;
    let status = factory::delete_one(&state.resource(ResourceKind::Users), &id).await?;
    state.sessions.revoke_user(&id);
    Ok(status)
}
