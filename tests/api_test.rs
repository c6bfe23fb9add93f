//! HTTP integration tests
//!
//! Drives the full router (extractors, handlers, tower-http stack) over the in-memory store.

#![allow(clippy::unwrap_used)]

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tour_booking::{
    auth::{hash_password, hash_token},
    build_router,
    config::{builtin_config, resolve},
    AppState, MemoryStore, ResourceKind, Settings,
};
use tower::ServiceExt;

fn create_app_with(settings: Settings) -> (Router, AppState) {
    let catalog = resolve(&builtin_config().unwrap()).unwrap();
    let state = AppState::new(Arc::new(MemoryStore::new()), catalog, settings);
    (build_router(state.clone()), state)
}

fn create_test_app() -> (Router, AppState) {
    create_app_with(Settings {
        rate_limit_per_hour: 0,
        ..Settings::default()
    })
}

fn build_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => {
            let raw = body.to_string();
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::CONTENT_LENGTH, raw.len())
                .body(Body::from(raw))
                .unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn respond(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, value)
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, value) = respond(app, build_request(method, uri, token, body)).await;
    (status, value)
}

/// Insert a user with the given role directly and open a session for it.
async fn staff_token(state: &AppState, email: &str, role: &str) -> (String, String) {
    let mut doc = Map::new();
    doc.insert("name".into(), json!("Staff Member"));
    doc.insert("email".into(), json!(email));
    doc.insert("password".into(), json!(hash_password("test1234").unwrap()));
    doc.insert("role".into(), json!(role));
    let user = state.resource(ResourceKind::Users).insert_raw(doc).await.unwrap();
    let id = user["id"].as_str().unwrap().to_string();
    (state.sessions.issue(&id), id)
}

async fn signup(app: &Router, name: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/users/signup",
        None,
        Some(json!({"name": name, "email": email, "password": "test1234", "passwordConfirm": "test1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
    (
        body["token"].as_str().unwrap().to_string(),
        body["data"]["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn tour(name: &str, price: f64, difficulty: &str) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": difficulty,
        "price": price,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "imageCover": "tour-1-cover.jpg",
        "startLocation": {"type": "Point", "coordinates": [-115.570154, 51.178456]}
    })
}

async fn create_tour(app: &Router, token: &str, body: Value) -> String {
    let (status, created) = send(app, Method::POST, "/api/v1/tours", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "tour create failed: {}", created);
    created["data"]["doc"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let (app, _) = create_test_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/api/v1/nothing-here", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find /api/v1/nothing-here on this server!");
}

#[tokio::test]
async fn test_signup_login_and_me() {
    let (app, _) = create_test_app();
    let (token, id) = signup(&app, "Laura Wilson", "Laura@Example.com").await;

    let (status, me) = send(&app, Method::GET, "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["doc"]["id"], json!(id));
    assert_eq!(me["data"]["doc"]["email"], "laura@example.com");
    assert!(me["data"]["doc"].get("password").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/users/login",
        None,
        Some(json!({"email": "laura@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect email or password");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/users/login",
        None,
        Some(json!({"email": "laura@example.com", "password": "test1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().unwrap().len() >= 32);
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let (app, _) = create_test_app();
    signup(&app, "Laura Wilson", "laura@example.com").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/users/signup",
        None,
        Some(json!({"name": "Other", "email": "laura@example.com", "password": "test1234", "passwordConfirm": "test1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn test_protected_routes_require_login_and_role() {
    let (app, _) = create_test_app();
    let (status, body) = send(&app, Method::POST, "/api/v1/tours", None, Some(tour("The Forest Hiker", 397.0, "easy"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "fail");

    let (token, _) = signup(&app, "Laura Wilson", "laura@example.com").await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/tours",
        Some(&token),
        Some(tour("The Forest Hiker", 397.0, "easy")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tour_factory_operations() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    let id = create_tour(&app, &admin, tour("The Forest Hiker", 397.0, "easy")).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/tours/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doc"]["slug"], "the-forest-hiker");
    assert_eq!(body["data"]["doc"]["reviews"], json!([]));

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/tours/{}", id),
        Some(&admin),
        Some(json!({"price": 497})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doc"]["price"], json!(497.0));

    let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/tours/{}", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    for method in [Method::GET, Method::DELETE] {
        let (status, body) = send(&app, method, &format!("/api/v1/tours/{}", id), Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "No document found with that ID");
    }

    let (status, _) = send(&app, Method::GET, "/api/v1/tours/not-an-id", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validation_failures_are_client_errors() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;

    let (status, body) = send(&app, Method::POST, "/api/v1/tours", Some(&admin), Some(tour("Short", 397.0, "easy"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "fail");
    assert!(body["message"].as_str().unwrap().starts_with("Invalid input data."));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/tours",
        Some(&admin),
        Some(tour("The Forest Hiker", 397.0, "extreme")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    create_tour(&app, &admin, tour("The Forest Hiker", 397.0, "easy")).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/tours",
        Some(&admin),
        Some(tour("The Forest Hiker", 197.0, "medium")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_pipeline() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    for (name, price, difficulty) in [
        ("The Forest Hiker", 397.0, "easy"),
        ("The Sea Explorer", 497.0, "medium"),
        ("The Snow Adventurer", 997.0, "difficult"),
        ("The City Wanderer", 1197.0, "easy"),
    ] {
        create_tour(&app, &admin, tour(name, price, difficulty)).await;
    }

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/tours?price%5Blt%5D=1000&sort=-price&fields=name,price",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 3);
    assert_eq!(body["total"], 3);
    let tours = body["data"]["tours"].as_array().unwrap();
    let names: Vec<&str> = tours.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["The Snow Adventurer", "The Sea Explorer", "The Forest Hiker"]);
    assert!(tours[0].get("difficulty").is_none());
    assert!(tours[0].get("id").is_some());

    let (_, body) = send(&app, Method::GET, "/api/v1/tours?difficulty=easy&difficulty=medium", None, None).await;
    assert_eq!(body["results"], 3);

    let (_, body) = send(&app, Method::GET, "/api/v1/tours?search=snow", None, None).await;
    assert_eq!(body["results"], 1);

    let (_, body) = send(&app, Method::GET, "/api/v1/tours?sort=price&limit=3&page=2", None, None).await;
    assert_eq!(body["page"], 2);
    assert_eq!(body["data"]["tours"][0]["name"], "The City Wanderer");

    let (status, body) = send(&app, Method::GET, "/api/v1/tours?limit=3&page=3", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "This page does not exist");

    let (status, body) = send(&app, Method::GET, "/api/v1/tours/top-5-cheap", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 4);
    assert_eq!(body["data"]["tours"][0]["name"], "The Forest Hiker");
}

#[tokio::test]
async fn test_reviews_recompute_tour_ratings() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    let tour_id = create_tour(&app, &admin, tour("The Forest Hiker", 397.0, "easy")).await;
    let (ann, _) = signup(&app, "Ann Smith", "ann@example.com").await;
    let (bob, _) = signup(&app, "Bob Jones", "bob@example.com").await;

    let reviews_uri = format!("/api/v1/tours/{}/reviews", tour_id);
    let (status, first) = send(&app, Method::POST, &reviews_uri, Some(&ann), Some(json!({"review": "Great", "rating": 5}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, &reviews_uri, Some(&bob), Some(json!({"review": "Fine", "rating": 4}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/tours/{}", tour_id), None, None).await;
    assert_eq!(body["data"]["doc"]["ratingsQuantity"], 2);
    assert_eq!(body["data"]["doc"]["ratingsAverage"], json!(4.5));

    let (status, _) = send(&app, Method::POST, &reviews_uri, Some(&ann), Some(json!({"review": "Again", "rating": 1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::GET, &reviews_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);
    assert!(body["data"]["reviews"][0]["user"]["name"].is_string());

    let review_id = first["data"]["doc"]["id"].as_str().unwrap();
    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/reviews/{}", review_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/reviews/{}", review_id), Some(&ann), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/tours/{}", tour_id), None, None).await;
    assert_eq!(body["data"]["doc"]["ratingsQuantity"], 1);
    assert_eq!(body["data"]["doc"]["ratingsAverage"], json!(4.0));
}

#[tokio::test]
async fn test_reports_and_geo_routes() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    create_tour(&app, &admin, tour("The Forest Hiker", 397.0, "easy")).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/tours/tour-stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"][0]["difficulty"], "EASY");
    assert_eq!(body["data"]["stats"][0]["numTours"], 1);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/tours/tours-within/200/center/51.2,-115.5/unit/mi",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 1);

    let (status, body) = send(&app, Method::GET, "/api/v1/tours/distances/51.2/unit/km", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide latitude and longitude in the format lat,lng.");

    let (status, _) = send(&app, Method::GET, "/api/v1/tours/monthly-plan/2021", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = send(&app, Method::GET, "/api/v1/tours/monthly-plan/2021", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["plan"].is_array());
}

#[tokio::test]
async fn test_booking_capture_and_my_tours() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    let tour_id = create_tour(&app, &admin, tour("The Forest Hiker", 397.0, "easy")).await;
    let (token, user_id) = signup(&app, "Ann Smith", "ann@example.com").await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/booking/checkout-session/{}", tour_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Something went very wrong!");

    let (status, _) = send(&app, Method::GET, "/api/v1/booking/checkout-success?tour=x", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/booking/checkout-success?tour={}&user={}&price=397", tour_id, user_id),
        None,
        None,
    )
    .await;
    assert!(status.is_redirection());

    let (status, body) = send(&app, Method::GET, "/api/v1/booking/my-tours", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tours"][0]["id"], json!(tour_id));

    let (status, body) = send(&app, Method::GET, "/api/v1/booking", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 1);
}

#[tokio::test]
async fn test_delete_me_ends_the_session() {
    let (app, _) = create_test_app();
    let (token, _) = signup(&app, "Ann Smith", "ann@example.com").await;
    let (status, _) = send(&app, Method::DELETE, "/api/v1/users/deleteMe", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/users/login",
        None,
        Some(json!({"email": "ann@example.com", "password": "test1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    let mut body = tour("The Forest Hiker", 397.0, "easy");
    body["description"] = json!("x".repeat(20 * 1024));
    let (status, body) = send(&app, Method::POST, "/api/v1/tours", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Request body is too large");
}

#[tokio::test]
async fn test_malformed_query_and_path_use_the_envelope() {
    let (app, _) = create_test_app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/booking/checkout-success?tour=a&tour=b&user=c&price=1",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert!(body["message"].as_str().unwrap().contains("duplicate field"));

    let (status, body) = send(&app, Method::GET, "/api/v1/tours/%FF", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn test_equal_prices_page_in_id_order() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    let mut ids = Vec::new();
    for name in ["The Park Camper", "The Sports Lover", "The Wine Taster", "The Star Gazer", "The Northern Lights"] {
        ids.push(create_tour(&app, &admin, tour(name, 500.0, "medium")).await);
    }
    let cheapest = create_tour(&app, &admin, tour("The Forest Hiker", 397.0, "easy")).await;
    ids.sort();
    ids.push(cheapest);

    let mut paged = Vec::new();
    for page in 1..=3 {
        let uri = format!("/api/v1/tours?sort=-price&fields=name,price&limit=2&page={}", page);
        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 6);
        let (_, again) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(again["data"], body["data"]);
        for t in body["data"]["tours"].as_array().unwrap() {
            paged.push(t["id"].as_str().unwrap().to_string());
        }
    }
    assert_eq!(paged, ids);
}

#[tokio::test]
async fn test_combined_filter_end_to_end() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    for (name, price, difficulty) in [
        ("The Park Camper", 90.0, "easy"),
        ("The Forest Hiker", 150.0, "easy"),
        ("The Sea Explorer", 250.0, "medium"),
        ("The Star Gazer", 100.0, "easy"),
    ] {
        create_tour(&app, &admin, tour(name, price, difficulty)).await;
    }

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/tours?difficulty=easy&price%5Bgte%5D=100&sort=price",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);
    assert_eq!(body["total"], 2);
    let names: Vec<&str> = body["data"]["tours"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["The Star Gazer", "The Forest Hiker"]);
}

#[tokio::test]
async fn test_review_cannot_move_to_missing_tour() {
    let (app, state) = create_test_app();
    let (admin, _) = staff_token(&state, "admin@example.com", "admin").await;
    let tour_id = create_tour(&app, &admin, tour("The Forest Hiker", 397.0, "easy")).await;
    let (ann, _) = signup(&app, "Ann Smith", "ann@example.com").await;
    let (_, review) = send(
        &app,
        Method::POST,
        &format!("/api/v1/tours/{}/reviews", tour_id),
        Some(&ann),
        Some(json!({"review": "Great", "rating": 5})),
    )
    .await;
    let review_uri = format!("/api/v1/reviews/{}", review["data"]["doc"]["id"].as_str().unwrap());

    let missing = uuid::Uuid::new_v4().to_string();
    let (status, body) = send(&app, Method::PATCH, &review_uri, Some(&admin), Some(json!({"tour": missing}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No tour found with that ID");

    let (_, body) = send(&app, Method::GET, &review_uri, None, None).await;
    assert_eq!(body["data"]["doc"]["tour"]["id"], json!(tour_id));
}

#[tokio::test]
async fn test_reset_password_requires_an_active_account() {
    let (app, state) = create_test_app();
    let users = state.resource(ResourceKind::Users);
    let reset = json!({"password": "newpass123", "passwordConfirm": "newpass123"});

    for (email, deactivate, expected) in [
        ("ann@example.com", false, StatusCode::OK),
        ("bob@example.com", true, StatusCode::BAD_REQUEST),
    ] {
        let (session, id) = signup(&app, "Reset Tester", email).await;
        if deactivate {
            let (status, _) = send(&app, Method::DELETE, "/api/v1/users/deleteMe", Some(&session), None).await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }
        let token = format!("reset-token-for-{}", id);
        let mut patch = Map::new();
        patch.insert("passwordResetToken".into(), json!(hash_token(&token)));
        patch.insert("passwordResetExpires".into(), json!("2999-01-01T00:00:00.000Z"));
        users.patch_raw(&id, patch).await.unwrap();

        let uri = format!("/api/v1/users/resetPassword/{}", token);
        let (status, body) = send(&app, Method::PATCH, &uri, None, Some(reset.clone())).await;
        assert_eq!(status, expected, "{}: {}", email, body);
        if deactivate {
            assert_eq!(body["message"], "Token is invalid or has expired");
            assert!(body.get("token").is_none());
        } else {
            assert!(body["token"].is_string());
        }
    }
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let (app, _) = create_test_app();
    for uri in ["/health", "/api/v1/tours", "/api/v1/nothing-here"] {
        let (_, headers, _) = respond(&app, build_request(Method::GET, uri, None, None)).await;
        assert_eq!(headers["x-content-type-options"], "nosniff", "{}", uri);
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN", "{}", uri);
        assert_eq!(headers["referrer-policy"], "no-referrer", "{}", uri);
    }
}

#[tokio::test]
async fn test_api_is_rate_limited_per_client() {
    let (app, _) = create_app_with(Settings {
        rate_limit_per_hour: 2,
        ..Settings::default()
    });
    let from = |ip: [u8; 4], uri: &str| {
        let mut request = build_request(Method::GET, uri, None, None);
        request.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        request
    };

    for _ in 0..2 {
        let (status, _, _) = respond(&app, from([10, 0, 0, 1], "/api/v1/tours")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _, body) = respond(&app, from([10, 0, 0, 1], "/api/v1/tours")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Too many requests from this IP, please try again in an hour!");

    let (status, _, _) = respond(&app, from([10, 0, 0, 2], "/api/v1/tours")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = respond(&app, from([10, 0, 0, 1], "/health")).await;
    assert_eq!(status, StatusCode::OK);
}
