//! Document store seam: the capability every resource is built on, with PostgreSQL and
//! in-memory implementations.

mod memory;
pub mod migration;
mod postgres;

pub use memory::MemoryStore;
pub use migration::apply_migrations;
pub use postgres::{ensure_database_exists, PgStore};

use crate::config::ResourceDescriptor;
use crate::query::{CollectionQuery, FilterSet};
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Schema constraint rejected the write (missing required field, bad value).
    #[error("{0}")]
    Constraint(String),
    /// Unique constraint rejected the write.
    #[error("{0}")]
    Duplicate(String),
    #[error("store backend: {0}")]
    Backend(String),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Collection operations for one resource at a time. Documents are JSON objects keyed by
/// API field names; the store fills `id`, `createdAt` and declared defaults on insert and
/// enforces required and unique fields.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, resource: &ResourceDescriptor, doc: Document) -> Result<Value, StoreError>;

    /// Every stored field, hidden ones included.
    async fn find_by_id(&self, resource: &ResourceDescriptor, id: &str) -> Result<Option<Value>, StoreError>;

    async fn find(&self, resource: &ResourceDescriptor, query: &CollectionQuery) -> Result<Vec<Value>, StoreError>;

    async fn count(&self, resource: &ResourceDescriptor, filter: &FilterSet) -> Result<u64, StoreError>;

    /// Apply `patch` to the document; `None` when no document has that id.
    async fn update_by_id(
        &self,
        resource: &ResourceDescriptor,
        id: &str,
        patch: Document,
    ) -> Result<Option<Value>, StoreError>;

    /// Remove the document and return it; `None` when no document has that id.
    async fn delete_by_id(&self, resource: &ResourceDescriptor, id: &str) -> Result<Option<Value>, StoreError>;

    async fn delete_all(&self, resource: &ResourceDescriptor) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
