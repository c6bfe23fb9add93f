//! /api/v1 resource routes. Role checks live in the handlers, next to the extractor that
//! authenticates the caller.

use crate::handlers::{auth, bookings, reviews, tours, users};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn tour_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(tours::get_all_tours).post(tours::create_tour))
        .route("/top-5-cheap", get(tours::top_five_cheap))
        .route("/tour-stats", get(tours::tour_stats))
        .route("/monthly-plan/:year", get(tours::monthly_plan))
        .route(
            "/tours-within/:distance/center/:latlng/unit/:unit",
            get(tours::tours_within),
        )
        .route("/distances/:latlng/unit/:unit", get(tours::distances))
        .route(
            "/:id",
            get(tours::get_tour).patch(tours::update_tour).delete(tours::delete_tour),
        )
        .route(
            "/:id/reviews",
            get(reviews::get_tour_reviews).post(reviews::create_tour_review),
        )
}

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::get_all_reviews).post(reviews::create_review))
        .route(
            "/:id",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password))
        .route("/updateMyPassword", patch(auth::update_my_password))
        .route("/me", get(users::get_me))
        .route("/updateMe", patch(users::update_me))
        .route("/deleteMe", axum::routing::delete(users::delete_me))
        .route("/", get(users::get_all_users).post(users::create_user))
        .route(
            "/:id",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
}

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout-session/:tourId", get(bookings::checkout_session))
        .route("/checkout-success", get(bookings::checkout_success))
        .route("/my-tours", get(bookings::my_tours))
        .route("/", get(bookings::get_all_bookings).post(bookings::create_booking))
        .route(
            "/:id",
            get(bookings::get_booking)
                .patch(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
}

/// Every resource router under its /api/v1 prefix.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/api/v1/tours", tour_routes())
        .nest("/api/v1/reviews", review_routes())
        .nest("/api/v1/users", user_routes())
        .nest("/api/v1/booking", booking_routes())
}
