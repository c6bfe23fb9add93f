//! Tour booking backend: catalog-driven REST resources with a composable query pipeline.

pub mod auth;
pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod payment;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_catalog, resolve, Catalog, ResourceKind, Settings, StoreBackend};
pub use error::{AppError, ConfigError};
pub use routes::build_router;
pub use service::Resource;
pub use state::AppState;
pub use store::{apply_migrations, ensure_database_exists, DocumentStore, MemoryStore, PgStore};
