//! Router assembly: common routes, the rate-limited API, the tower-http stack and the fallback.

mod api;
mod common;

pub use api::{api_routes, booking_routes, review_routes, tour_routes, user_routes};
pub use common::common_routes;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Hardening headers added to every response that does not set them itself.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("x-xss-protection", "0"),
];

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri.path()))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal())).into_response()
}

/// The limiter answers with a bare 429; re-render it through the envelope.
async fn rate_limit_envelope(response: Response) -> Response {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return AppError::TooManyRequests.into_response();
    }
    response
}

/// Per-client-IP limiter allowing `per_hour` requests in any hour; zero disables it.
fn rate_limited(router: Router<AppState>, per_hour: u32) -> Router<AppState> {
    if per_hour == 0 {
        return router;
    }
    let replenish_ms = (3_600_000 / u64::from(per_hour)).max(1);
    let Some(config) = GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(per_hour)
        .finish()
    else {
        tracing::warn!(per_hour, "invalid rate limit; serving without one");
        return router;
    };
    router
        .layer(GovernorLayer {
            config: Arc::new(config),
        })
        .layer(middleware::map_response(rate_limit_envelope))
}

fn with_security_headers(mut router: Router) -> Router {
    for &(name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// The complete application router. Serve it with connect info so the limiter can key on
/// the peer address.
pub fn build_router(state: AppState) -> Router {
    let settings = state.settings.clone();
    let router = Router::new()
        .merge(common_routes())
        .merge(rate_limited(api_routes(), settings.rate_limit_per_hour))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(settings.body_limit_bytes))
        .layer(cors_layer(&settings.cors_origins))
        .with_state(state);
    with_security_headers(router)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}
