//! Resource factory and the domain services built on it.

mod crud;
pub mod ratings;
pub mod reports;
mod validation;
pub use crud::{parse_id, ListPage, Resource};
pub use validation::RequestValidator;
