//! In-process document store with the same query semantics as the PostgreSQL store.
//! Backs the test suite and `STORE=memory` development runs.

use crate::config::{ResourceDescriptor, CREATED_AT_FIELD, ID_FIELD};
use crate::query::coerce::format_timestamp;
use crate::query::model::sort_order;
use crate::query::{CollectionQuery, FilterSet, Projection, SortKey};
use crate::store::{Document, DocumentStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".into())
}

fn id_of(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

fn matches_filter(doc: &Document, filter: &FilterSet) -> bool {
    let conditions_hold = filter.conditions.iter().all(|c| {
        let value = doc.get(&c.field).unwrap_or(&Value::Null);
        c.op.matches(value, &c.value)
    });
    if !conditions_hold {
        return false;
    }
    match &filter.search {
        None => true,
        Some(search) => {
            let term = search.term.to_lowercase();
            search.fields.iter().any(|f| {
                doc.get(f)
                    .and_then(Value::as_str)
                    .map(|s| s.to_lowercase().contains(&term))
                    .unwrap_or(false)
            })
        }
    }
}

fn compare_docs(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = sort_order(a.get(&key.field), b.get(&key.field));
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn project(doc: &Document, projection: &Projection) -> Value {
    match projection {
        Projection::All => Value::Object(doc.clone()),
        Projection::Fields(fields) => Value::Object(
            fields
                .iter()
                .filter_map(|f| doc.get(f).map(|v| (f.clone(), v.clone())))
                .collect(),
        ),
    }
}

/// Required and unique checks against the rest of the collection.
fn check_constraints(resource: &ResourceDescriptor, doc: &Document, others: &[&Document]) -> Result<(), StoreError> {
    for f in &resource.fields {
        if f.validation.required == Some(true) && doc.get(&f.name).map(Value::is_null).unwrap_or(true) {
            return Err(StoreError::Constraint(format!("{} is required", f.name)));
        }
    }
    let mut unique_groups: Vec<Vec<&str>> = resource
        .fields
        .iter()
        .filter(|f| f.unique || f.name == ID_FIELD)
        .map(|f| vec![f.name.as_str()])
        .collect();
    unique_groups.extend(
        resource
            .unique_together
            .iter()
            .map(|g| g.iter().map(String::as_str).collect()),
    );
    for group in unique_groups {
        let key: Vec<&Value> = group.iter().map(|f| doc.get(*f).unwrap_or(&Value::Null)).collect();
        if key.iter().any(|v| v.is_null()) {
            continue;
        }
        let clash = others.iter().any(|other| {
            group
                .iter()
                .zip(&key)
                .all(|(f, v)| other.get(*f).map(|o| o == *v).unwrap_or(false))
        });
        if clash {
            return Err(StoreError::Duplicate(group.join(", ")));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, resource: &ResourceDescriptor, mut doc: Document) -> Result<Value, StoreError> {
        for f in &resource.fields {
            if doc.get(&f.name).is_some() {
                continue;
            }
            let value = if f.name == ID_FIELD {
                Value::String(uuid::Uuid::new_v4().to_string())
            } else if f.name == CREATED_AT_FIELD {
                Value::String(format_timestamp(chrono::Utc::now()))
            } else {
                f.default.clone().unwrap_or(Value::Null)
            };
            doc.insert(f.name.clone(), value);
        }
        doc.retain(|k, _| resource.field(k).is_some());

        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let docs = collections.entry(resource.name.clone()).or_default();
        check_constraints(resource, &doc, &docs.iter().collect::<Vec<_>>())?;
        docs.push(doc.clone());
        Ok(Value::Object(doc))
    }

    async fn find_by_id(&self, resource: &ResourceDescriptor, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections
            .get(&resource.name)
            .and_then(|docs| docs.iter().find(|d| id_of(d) == Some(id)))
            .map(|d| Value::Object(d.clone())))
    }

    async fn find(&self, resource: &ResourceDescriptor, query: &CollectionQuery) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let Some(docs) = collections.get(&resource.name) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<&Document> = docs.iter().filter(|d| matches_filter(d, &query.filter)).collect();
        hits.sort_by(|a, b| compare_docs(a, b, &query.sort));
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let take = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(hits
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|d| project(d, &query.projection))
            .collect())
    }

    async fn count(&self, resource: &ResourceDescriptor, filter: &FilterSet) -> Result<u64, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections
            .get(&resource.name)
            .map(|docs| docs.iter().filter(|d| matches_filter(d, filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn update_by_id(
        &self,
        resource: &ResourceDescriptor,
        id: &str,
        patch: Document,
    ) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let Some(docs) = collections.get_mut(&resource.name) else {
            return Ok(None);
        };
        let Some(pos) = docs.iter().position(|d| id_of(d) == Some(id)) else {
            return Ok(None);
        };
        let mut updated = docs[pos].clone();
        for (k, v) in patch {
            if k != ID_FIELD && resource.field(&k).is_some() {
                updated.insert(k, v);
            }
        }
        let others: Vec<&Document> = docs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pos)
            .map(|(_, d)| d)
            .collect();
        check_constraints(resource, &updated, &others)?;
        docs[pos] = updated.clone();
        Ok(Some(Value::Object(updated)))
    }

    async fn delete_by_id(&self, resource: &ResourceDescriptor, id: &str) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let Some(docs) = collections.get_mut(&resource.name) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .position(|d| id_of(d) == Some(id))
            .map(|pos| Value::Object(docs.remove(pos))))
    }

    async fn delete_all(&self, resource: &ResourceDescriptor) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        Ok(collections
            .remove(&resource.name)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
