//! Sign-up, login/logout and the password lifecycle.

use crate::auth::{hash_password, hash_token, random_token, verify_password};
use crate::config::ResourceKind;
use crate::error::AppError;
use crate::extractors::{session_token, CurrentUser, JsonBody, PathParams, TOKEN_COOKIE};
use crate::query::coerce::format_timestamp;
use crate::query::{CompareOp, Condition};
use crate::response::keyed;
use crate::state::AppState;
use crate::store::Document;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const MIN_PASSWORD_LEN: usize = 8;
const RESET_TOKEN_MINUTES: i64 = 10;

#[derive(Serialize)]
struct TokenEnvelope {
    status: &'static str,
    token: String,
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupBody {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirm: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordBody {
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    password: Option<String>,
    password_confirm: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordBody {
    password_current: Option<String>,
    password: Option<String>,
    password_confirm: Option<String>,
}

/// New password must be long enough and confirmed.
fn checked_password(password: Option<String>, confirm: Option<String>) -> Result<String, AppError> {
    let password = password.ok_or_else(|| AppError::Validation("Please provide a password".into()))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if confirm.as_deref() != Some(password.as_str()) {
        return Err(AppError::Validation("Passwords are not the same!".into()));
    }
    Ok(password)
}

fn token_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE, token, max_age_secs
    ))
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// Issue a session for `user` and answer with the token in the body and a cookie.
fn send_token(state: &AppState, user: Value, status: StatusCode) -> Result<Response, AppError> {
    let user_id = user
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Internal("user document without id".into()))?;
    let token = state.sessions.issue(user_id);
    let cookie = token_cookie(&token, state.sessions.ttl().num_seconds())?;
    let user = state.resource(ResourceKind::Users).public(user);
    let body = TokenEnvelope {
        status: "success",
        token,
        data: keyed("user", user),
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Patch that installs a new password and invalidates older sessions.
fn password_patch(password: &str) -> Result<Document, AppError> {
    let mut patch = Document::new();
    patch.insert("password".into(), Value::String(hash_password(password)?));
    // one second back so the session issued right after the change stays valid
    let changed = Utc::now() - Duration::seconds(1);
    patch.insert("passwordChangedAt".into(), Value::String(format_timestamp(changed)));
    patch.insert("passwordResetToken".into(), Value::Null);
    patch.insert("passwordResetExpires".into(), Value::Null);
    Ok(patch)
}

pub async fn signup(State(state): State<AppState>, JsonBody(body): JsonBody<SignupBody>) -> Result<Response, AppError> {
    let password = checked_password(body.password, body.password_confirm)?;
    let mut server_fields = Document::new();
    server_fields.insert("password".into(), Value::String(hash_password(&password)?));
    server_fields.insert("role".into(), Value::String("user".into()));
    let user = state
        .resource(ResourceKind::Users)
        .create_with(json!({ "name": body.name, "email": body.email }), server_fields)
        .await?;
    tracing::info!(user = %user["id"], "user signed up");
    send_token(&state, user, StatusCode::CREATED)
}

pub async fn login(State(state): State<AppState>, JsonBody(body): JsonBody<LoginBody>) -> Result<Response, AppError> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(AppError::BadRequest("Please provide email and password!".into()));
    };
    let incorrect = || AppError::Unauthorized("Incorrect email or password".into());
    let user = state
        .resource(ResourceKind::Users)
        .find_one_raw(vec![Condition::eq("email", json!(email.trim().to_lowercase()))])
        .await?
        .ok_or_else(incorrect)?;
    let stored = user.get("password").and_then(Value::as_str).unwrap_or("");
    let active = user.get("active").and_then(Value::as_bool).unwrap_or(true);
    if !active || !verify_password(&password, stored) {
        return Err(incorrect());
    }
    send_token(&state, user, StatusCode::OK)
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }
    let cookie = token_cookie("loggedout", 10)?;
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(json!({ "status": "success" }))).into_response())
}

pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ForgotPasswordBody>,
) -> Result<Json<Value>, AppError> {
    let email = body
        .email
        .ok_or_else(|| AppError::BadRequest("Please provide your email address".into()))?;
    let users = state.resource(ResourceKind::Users);
    let user = users
        .find_one_raw(vec![Condition::eq("email", json!(email.trim().to_lowercase()))])
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with that email address.".into()))?;
    let user_id = user.get("id").and_then(Value::as_str).unwrap_or_default().to_string();

    let token = random_token();
    let mut patch = Document::new();
    patch.insert("passwordResetToken".into(), Value::String(hash_token(&token)));
    patch.insert(
        "passwordResetExpires".into(),
        Value::String(format_timestamp(Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES))),
    );
    users.patch_raw(&user_id, patch).await?;

    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.settings.public_url.trim_end_matches('/'),
        token
    );
    tracing::info!(user = %user_id, reset_url = %reset_url, "password reset requested");
    Ok(Json(json!({ "status": "success", "message": "Token sent to email!" })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    PathParams(token): PathParams<String>,
    JsonBody(body): JsonBody<ResetPasswordBody>,
) -> Result<Response, AppError> {
    let users = state.resource(ResourceKind::Users);
    let now = format_timestamp(Utc::now());
    let user = users
        .find_one_raw(vec![
            Condition::eq("passwordResetToken", json!(hash_token(&token))),
            Condition {
                field: "passwordResetExpires".into(),
                op: CompareOp::Gt,
                value: json!(now),
            },
        ])
        .await?
        .filter(|u| u.get("active").and_then(Value::as_bool).unwrap_or(true))
        .ok_or_else(|| AppError::BadRequest("Token is invalid or has expired".into()))?;
    let password = checked_password(body.password, body.password_confirm)?;
    let user_id = user.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    let updated = users
        .patch_raw(&user_id, password_patch(&password)?)
        .await?
        .ok_or_else(AppError::doc_not_found)?;
    send_token(&state, updated, StatusCode::OK)
}

pub async fn update_my_password(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(body): JsonBody<UpdatePasswordBody>,
) -> Result<Response, AppError> {
    let stored = user.doc.get("password").and_then(Value::as_str).unwrap_or("");
    let current = body.password_current.unwrap_or_default();
    if !verify_password(&current, stored) {
        return Err(AppError::Unauthorized("Your current password is wrong.".into()));
    }
    let password = checked_password(body.password, body.password_confirm)?;
    let updated = state
        .resource(ResourceKind::Users)
        .patch_raw(&user.id, password_patch(&password)?)
        .await?
        .ok_or_else(AppError::doc_not_found)?;
    state.sessions.revoke(&user.token);
    send_token(&state, updated, StatusCode::OK)
}
