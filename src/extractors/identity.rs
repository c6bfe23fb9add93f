//! Authenticated caller, resolved from a session token before any handler runs.

use crate::auth::{Role, Session};
use crate::config::ResourceKind;
use crate::error::AppError;
use crate::query::coerce::parse_timestamp;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use serde_json::Value;

/// Cookie carrying the session token for browser clients.
pub const TOKEN_COOKIE: &str = "token";

/// `Authorization: Bearer <token>` first, then the `token` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty() && *value != "loggedout")
        .map(|(_, value)| value.to_string())
}

/// Tokens issued before the last password change are stale.
fn changed_password_after(user: &Value, session: &Session) -> bool {
    user.get("passwordChangedAt")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .map(|changed| changed > session.issued_at)
        .unwrap_or(false)
}

#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
    pub token: String,
    /// Stored user document, hidden fields included.
    pub doc: Value,
}

impl CurrentUser {
    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden("You do not have permission to perform this action".into()))
        }
    }

    pub fn email(&self) -> &str {
        self.doc.get("email").and_then(Value::as_str).unwrap_or("")
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("You are not logged in! Please log in to get access.".into()))?;
        let session = state
            .sessions
            .lookup(&token)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired session. Please log in again.".into()))?;
        let user = state
            .resource(ResourceKind::Users)
            .find_raw(&session.user_id)
            .await?
            .filter(|u| u.get("active").and_then(Value::as_bool).unwrap_or(true))
            .ok_or_else(|| AppError::Unauthorized("The user belonging to this token no longer exists.".into()))?;
        if changed_password_after(&user, &session) {
            state.sessions.revoke(&token);
            return Err(AppError::Unauthorized("User recently changed password! Please log in again.".into()));
        }
        let role = user
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("user")
            .parse::<Role>()
            .map_err(AppError::Internal)?;
        Ok(CurrentUser {
            id: session.user_id,
            role,
            token,
            doc: user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=def"));
        assert_eq!(session_token(&headers), Some("abc".into()));
    }

    #[test]
    fn cookie_token_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=def"));
        assert_eq!(session_token(&headers), Some("def".into()));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=loggedout"));
        assert_eq!(session_token(&headers), None);
    }
}
