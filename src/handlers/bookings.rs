//! Checkout sessions, booking capture after payment, and booking management.

use crate::auth::Role;
use crate::config::ResourceKind;
use crate::error::AppError;
use crate::extractors::{CurrentUser, JsonBody, PathParams, QueryParams};
use crate::handlers::factory::{self, DocResponse, PageResponse, QueryPairs};
use crate::payment::{CheckoutRequest, LineItem};
use crate::query::{CompareOp, Condition};
use crate::service::parse_id;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Redirect,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

const BOOKING_MANAGERS: &[Role] = &[Role::Admin, Role::LeadGuide];

fn text<'a>(doc: &'a Value, field: &str) -> &'a str {
    doc.get(field).and_then(Value::as_str).unwrap_or("")
}

/// Line item and redirect URLs for one seat on `tour`.
fn checkout_request(base: &str, tour: &Value, user: &CurrentUser) -> Result<CheckoutRequest, AppError> {
    let tour_id = text(tour, "id");
    let price = tour
        .get("price")
        .and_then(Value::as_f64)
        .ok_or_else(|| AppError::Internal(format!("tour {} has no price", tour_id)))?;
    let mut images = Vec::new();
    let cover = text(tour, "imageCover");
    if !cover.is_empty() {
        images.push(format!("{}/img/tours/{}", base, cover));
    }
    Ok(CheckoutRequest {
        success_url: format!(
            "{}/api/v1/booking/checkout-success?tour={}&user={}&price={}",
            base, tour_id, user.id, price
        ),
        cancel_url: format!("{}/tour/{}", base, text(tour, "slug")),
        customer_email: user.email().to_string(),
        client_reference_id: tour_id.to_string(),
        line_item: LineItem {
            name: format!("{} Tour", text(tour, "name")),
            description: text(tour, "summary").to_string(),
            images,
            unit_amount: (price * 100.0).round() as i64,
            currency: "usd".into(),
            quantity: 1,
        },
    })
}

pub async fn checkout_session(
    State(state): State<AppState>,
    PathParams(tour_id): PathParams<String>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let tour = state.resource(ResourceKind::Tours).get_one(&tour_id, &[]).await?;
    let base = state.settings.public_url.trim_end_matches('/');
    let request = checkout_request(base, &tour, &user)?;
    let session = state.payments.create_checkout_session(&request).await?;
    Ok(Json(json!({ "status": "success", "session": session })))
}

#[derive(Deserialize)]
pub struct CheckoutSuccess {
    tour: Option<String>,
    user: Option<String>,
    price: Option<String>,
}

/// Redirect target of a completed checkout: record the booking, send the browser home.
pub async fn checkout_success(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<CheckoutSuccess>,
) -> Result<Redirect, AppError> {
    let (Some(tour), Some(user), Some(price)) = (params.tour, params.user, params.price) else {
        return Err(AppError::BadRequest("Missing booking parameters".into()));
    };
    let tour = parse_id(&tour)?;
    let user = parse_id(&user)?;
    let price: f64 = price
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid price: {}", price)))?;
    let booking = state
        .resource(ResourceKind::Bookings)
        .create_one(json!({ "tour": tour, "user": user, "price": price }))
        .await?;
    tracing::info!(booking = %booking["id"], tour = %tour, user = %user, "booking recorded");
    Ok(Redirect::to(&state.settings.public_url))
}

/// Tours the caller has booked.
pub async fn my_tours(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Value>, AppError> {
    let bookings = state
        .resource(ResourceKind::Bookings)
        .find_all(vec![Condition::eq("user", json!(user.id))])
        .await?;
    let tour_ids: Vec<Value> = bookings.iter().filter_map(|b| b.get("tour").cloned()).collect();
    let tours = if tour_ids.is_empty() {
        Vec::new()
    } else {
        state
            .resource(ResourceKind::Tours)
            .find_all(vec![Condition {
                field: "id".into(),
                op: CompareOp::In,
                value: Value::Array(tour_ids),
            }])
            .await?
    };
    Ok(Json(json!({ "status": "success", "results": tours.len(), "data": { "tours": tours } })))
}

pub async fn get_all_bookings(
    State(state): State<AppState>,
    user: CurrentUser,
    QueryParams(pairs): QueryParams<QueryPairs>,
) -> Result<PageResponse, AppError> {
    user.require(BOOKING_MANAGERS)?;
    factory::get_all(&state.resource(ResourceKind::Bookings), "bookings", pairs, Vec::new(), &[]).await
}

pub async fn create_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    user.require(BOOKING_MANAGERS)?;
    factory::create_one(&state.resource(ResourceKind::Bookings), body).await
}

pub async fn get_booking(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
) -> Result<DocResponse, AppError> {
    user.require(BOOKING_MANAGERS)?;
    factory::get_one(&state.resource(ResourceKind::Bookings), &id, &["user", "tour"]).await
}

pub async fn update_booking(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
    JsonBody(body): JsonBody<Value>,
) -> Result<DocResponse, AppError> {
    user.require(BOOKING_MANAGERS)?;
    factory::update_one(&state.resource(ResourceKind::Bookings), &id, body).await
}

pub async fn delete_booking(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    user.require(BOOKING_MANAGERS)?;
    factory::delete_one(&state.resource(ResourceKind::Bookings), &id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_line_item_is_priced_in_cents() {
        let tour = json!({
            "id": "t1", "name": "The Forest Hiker", "slug": "the-forest-hiker", "price": 397.5,
            "summary": "Breathtaking hike", "imageCover": "tour-1-cover.jpg"
        });
        let user = CurrentUser {
            id: "u1".into(),
            role: Role::User,
            token: "tok".into(),
            doc: json!({"email": "ann@example.com"}),
        };
        let req = checkout_request("http://localhost:3000", &tour, &user).unwrap();
        assert_eq!(req.line_item.unit_amount, 39_750);
        assert_eq!(req.line_item.name, "The Forest Hiker Tour");
        assert_eq!(req.cancel_url, "http://localhost:3000/tour/the-forest-hiker");
        assert_eq!(req.customer_email, "ann@example.com");
        assert!(req.success_url.ends_with("?tour=t1&user=u1&price=397.5"));
    }
}
