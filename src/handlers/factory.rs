//! The shared request/response contract of the four factory operations plus list.

use crate::error::AppError;
use crate::query::{Condition, QuerySpec};
use crate::response::{self, Envelope, PageEnvelope};
use crate::service::Resource;
use axum::{http::StatusCode, Json};
use serde_json::Value;

pub type DocResponse = (StatusCode, Json<Envelope<Value>>);
pub type PageResponse = (StatusCode, Json<PageEnvelope>);

/// Raw query pairs; repeated keys are kept.
pub type QueryPairs = Vec<(String, String)>;

pub async fn create_one(resource: &Resource, body: Value) -> Result<DocResponse, AppError> {
    let doc = resource.create_one(body).await?;
    Ok(response::doc_created(doc))
}

pub async fn get_one(resource: &Resource, id: &str, expand: &[&str]) -> Result<DocResponse, AppError> {
    let doc = resource.get_one(id, expand).await?;
    Ok(response::doc_ok(doc))
}

pub async fn update_one(resource: &Resource, id: &str, body: Value) -> Result<DocResponse, AppError> {
    let doc = resource.update_one(id, body).await?;
    Ok(response::doc_ok(doc))
}

pub async fn delete_one(resource: &Resource, id: &str) -> Result<StatusCode, AppError> {
    resource.delete_one(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pipeline-driven list under `data.<key>`.
pub async fn get_all(
    resource: &Resource,
    key: &str,
    pairs: QueryPairs,
    scope: Vec<Condition>,
    expand: &[&str],
) -> Result<PageResponse, AppError> {
    let spec = QuerySpec::from_pairs(pairs);
    let page = resource.list_scoped(&spec, scope, expand).await?;
    Ok(response::page(key, page))
}
