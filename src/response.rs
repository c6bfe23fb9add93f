//! Standard response envelope helpers.

use crate::service::ListPage;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
}

#[derive(Serialize)]
pub struct PageEnvelope {
    pub status: &'static str,
    pub results: u64,
    pub total: u64,
    pub page: u64,
    pub data: Map<String, Value>,
}

pub fn success<T: Serialize>(status: StatusCode, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        status,
        Json(Envelope {
            status: "success",
            data,
        }),
    )
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    success(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    success(StatusCode::CREATED, data)
}

/// Single document under `data.doc`, the shape every factory operation returns.
pub fn doc_ok(doc: Value) -> (StatusCode, Json<Envelope<Value>>) {
    ok(keyed("doc", doc))
}

pub fn doc_created(doc: Value) -> (StatusCode, Json<Envelope<Value>>) {
    created(keyed("doc", doc))
}

/// List result under `data.<key>` plus the counts the pipeline produced.
pub fn page(key: &str, page: ListPage) -> (StatusCode, Json<PageEnvelope>) {
    let mut data = Map::new();
    let results = page.documents.len() as u64;
    data.insert(key.to_string(), Value::Array(page.documents));
    (
        StatusCode::OK,
        Json(PageEnvelope {
            status: "success",
            results,
            total: page.total,
            page: page.page,
            data,
        }),
    )
}

pub fn keyed(key: &str, value: Value) -> Value {
    let mut m = Map::new();
    m.insert(key.to_string(), value);
    Value::Object(m)
}
