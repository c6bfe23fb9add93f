//! HTTP handlers: the shared factory contract and one module per resource.

pub mod auth;
pub mod bookings;
pub mod factory;
pub mod reviews;
pub mod tours;
pub mod users;
