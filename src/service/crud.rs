//! Resource factory: the generic create/get/update/delete/list operations every resource kind
//! is built from, executed against the [`DocumentStore`].

use crate::case::slugify;
use crate::config::{Catalog, ExpandDirection, ExpandSpec, ResourceDescriptor, ID_FIELD};
use crate::error::AppError;
use crate::query::coerce::normalize_json;
use crate::query::{CollectionQuery, CompareOp, Condition, QueryFeatures, QuerySpec, SortKey};
use crate::service::RequestValidator;
use crate::store::{Document, DocumentStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One page of a list request.
#[derive(Clone, Debug, PartialEq)]
pub struct ListPage {
    pub documents: Vec<Value>,
    /// Matches before pagination.
    pub total: u64,
    pub page: u64,
}

/// Descriptor bound to the shared store.
#[derive(Clone)]
pub struct Resource {
    descriptor: Arc<ResourceDescriptor>,
    store: Arc<dyn DocumentStore>,
    catalog: Arc<Catalog>,
}

/// Path identifiers must be UUIDs; anything else never reaches the store.
pub fn parse_id(raw: &str) -> Result<String, AppError> {
    uuid::Uuid::parse_str(raw.trim())
        .map(|u| u.to_string())
        .map_err(|_| AppError::BadRequest(format!("Invalid id: {}", raw)))
}

impl Resource {
    pub fn new(descriptor: Arc<ResourceDescriptor>, store: Arc<dyn DocumentStore>, catalog: Arc<Catalog>) -> Self {
        Resource {
            descriptor,
            store,
            catalog,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Insert the body as a new document: drop unknown and non-writable fields, type-check,
    /// derive the slug, run the schema rules.
    pub async fn create_one(&self, body: Value) -> Result<Value, AppError> {
        self.create_with(body, Document::new()).await
    }

    /// [`Resource::create_one`] plus server-set fields (password digests, forced roles) that
    /// override the body after validation.
    pub async fn create_with(&self, body: Value, server_fields: Document) -> Result<Value, AppError> {
        let mut doc = self.writable_body(body)?;
        RequestValidator::validate(&doc, &self.descriptor)?;
        doc.extend(server_fields);
        let created = self.store.insert(&self.descriptor, doc).await?;
        tracing::info!(resource = %self.descriptor.name, id = %created[ID_FIELD], "document created");
        Ok(self.public(created))
    }

    pub async fn get_one(&self, id: &str, expand: &[&str]) -> Result<Value, AppError> {
        let id = parse_id(id)?;
        let doc = self
            .store
            .find_by_id(&self.descriptor, &id)
            .await?
            .ok_or_else(AppError::doc_not_found)?;
        let mut docs = vec![self.public(doc)];
        self.expand(&mut docs, expand).await?;
        docs.pop().ok_or_else(AppError::doc_not_found)
    }

    /// Partial update; schema rules run on the fields being changed.
    pub async fn update_one(&self, id: &str, body: Value) -> Result<Value, AppError> {
        let id = parse_id(id)?;
        let patch = self.writable_body(body)?;
        RequestValidator::validate_partial(&patch, &self.descriptor)?;
        let updated = self
            .store
            .update_by_id(&self.descriptor, &id, patch)
            .await?
            .ok_or_else(AppError::doc_not_found)?;
        Ok(self.public(updated))
    }

    /// Remove the document; the removed document is returned for post-write hooks.
    pub async fn delete_one(&self, id: &str) -> Result<Value, AppError> {
        let id = parse_id(id)?;
        let removed = self
            .store
            .delete_by_id(&self.descriptor, &id)
            .await?
            .ok_or_else(AppError::doc_not_found)?;
        tracing::info!(resource = %self.descriptor.name, id = %id, "document deleted");
        Ok(self.public(removed))
    }

    /// Run the query pipeline: count the matches, then fetch the bounded page.
    pub async fn list(&self, spec: &QuerySpec, expand: &[&str]) -> Result<ListPage, AppError> {
        self.list_scoped(spec, Vec::new(), expand).await
    }

    /// [`Resource::list`] with extra conditions the client cannot override (nested routes,
    /// active-only user listings).
    pub async fn list_scoped(
        &self,
        spec: &QuerySpec,
        scope: Vec<Condition>,
        expand: &[&str],
    ) -> Result<ListPage, AppError> {
        let mut prepared = QueryFeatures::build(&self.descriptor, spec)?;
        prepared.query.filter.conditions.extend(scope);
        let total = self.store.count(&self.descriptor, &prepared.query.filter).await?;
        prepared.ensure_page_exists(total)?;
        let mut documents = self.store.find(&self.descriptor, &prepared.query).await?;
        self.expand(&mut documents, expand).await?;
        Ok(ListPage {
            documents,
            total,
            page: prepared.page,
        })
    }

    /// Every public document matching `conditions`, in default order.
    pub async fn find_all(&self, conditions: Vec<Condition>) -> Result<Vec<Value>, AppError> {
        let mut query = CollectionQuery::matching(conditions).with_fields(self.descriptor.public_field_names());
        query.sort = self.default_sort();
        Ok(self.store.find(&self.descriptor, &query).await?)
    }

    /// First stored document matching `conditions`, hidden fields included.
    pub async fn find_one_raw(&self, conditions: Vec<Condition>) -> Result<Option<Value>, AppError> {
        let query = CollectionQuery::matching(conditions).with_limit(1);
        Ok(self.store.find(&self.descriptor, &query).await?.into_iter().next())
    }

    /// Stored document by id, hidden fields included.
    pub async fn find_raw(&self, id: &str) -> Result<Option<Value>, AppError> {
        Ok(self.store.find_by_id(&self.descriptor, id).await?)
    }

    /// Insert a server-built document. Bypasses the writable filter, not the store's
    /// required/unique checks.
    pub async fn insert_raw(&self, doc: Document) -> Result<Value, AppError> {
        Ok(self.store.insert(&self.descriptor, doc).await?)
    }

    /// Apply a server-built patch; `None` when the id does not exist.
    pub async fn patch_raw(&self, id: &str, patch: Document) -> Result<Option<Value>, AppError> {
        Ok(self.store.update_by_id(&self.descriptor, id, patch).await?)
    }

    /// Insert a seed document: every declared field is kept and type-checked, request
    /// validation is skipped. Unknown keys are dropped.
    pub async fn import_one(&self, body: Value) -> Result<Value, AppError> {
        let Value::Object(map) = body else {
            return Err(AppError::BadRequest("Seed documents must be JSON objects".into()));
        };
        let mut doc = Document::new();
        for (key, value) in map {
            if let Some(f) = self.descriptor.field(&key) {
                let value = normalize_json(f, value).map_err(AppError::Validation)?;
                doc.insert(key, value);
            }
        }
        if !doc.contains_key("slug") {
            self.derive_slug(&mut doc);
        }
        self.insert_raw(doc).await
    }

    /// Remove every document of this resource; returns how many were removed.
    pub async fn delete_all(&self) -> Result<u64, AppError> {
        let removed = self.store.delete_all(&self.descriptor).await?;
        tracing::info!(resource = %self.descriptor.name, removed, "collection cleared");
        Ok(removed)
    }

    /// Strip hidden fields.
    pub fn public(&self, mut doc: Value) -> Value {
        self.descriptor.strip_hidden(&mut doc);
        doc
    }

    fn default_sort(&self) -> Vec<SortKey> {
        let mut keys: Vec<SortKey> = self
            .descriptor
            .default_sort
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(SortKey::parse)
            .collect();
        keys.push(SortKey::parse(ID_FIELD));
        keys
    }

    fn writable_body(&self, body: Value) -> Result<Document, AppError> {
        let Value::Object(map) = body else {
            return Err(AppError::BadRequest("Request body must be a JSON object".into()));
        };
        let mut doc = Document::new();
        for (key, value) in map {
            match self.descriptor.field(&key) {
                Some(f) if f.writable && !f.generated => {
                    let value = normalize_json(f, value).map_err(AppError::Validation)?;
                    doc.insert(key, value);
                }
                _ => tracing::debug!(resource = %self.descriptor.name, field = %key, "dropping body field"),
            }
        }
        self.derive_slug(&mut doc);
        Ok(doc)
    }

    fn derive_slug(&self, doc: &mut Document) {
        if let Some(source) = &self.descriptor.slug_from {
            if let Some(name) = doc.get(source).and_then(Value::as_str) {
                let slug = slugify(name);
                doc.insert("slug".into(), Value::String(slug));
            }
        }
    }

    /// Embed related documents for each requested expansion, batch-loaded with one `IN`
    /// query per expansion.
    async fn expand(&self, docs: &mut [Value], names: &[&str]) -> Result<(), AppError> {
        for name in names {
            let Some(spec) = self.descriptor.expand(name) else {
                tracing::debug!(resource = %self.descriptor.name, expand = %name, "unknown expansion");
                continue;
            };
            let Some(related) = self.catalog.by_name(&spec.resource) else {
                continue;
            };
            match &spec.direction {
                ExpandDirection::ToOne { local_field } => {
                    self.expand_to_one(docs, spec, related, local_field).await?;
                }
                ExpandDirection::ToMany { foreign_field } => {
                    self.expand_to_many(docs, spec, related, foreign_field).await?;
                }
            }
        }
        Ok(())
    }

    fn related_query(related: &ResourceDescriptor, spec: &ExpandSpec, key: &str, ids: Vec<Value>) -> CollectionQuery {
        let mut fields = vec![ID_FIELD.to_string()];
        fields.extend(
            spec.fields
                .iter()
                .filter(|f| related.field(f).map(|info| !info.hidden).unwrap_or(false))
                .cloned(),
        );
        if !fields.iter().any(|f| f == key) {
            fields.push(key.to_string());
        }
        let mut query = CollectionQuery::matching(vec![Condition {
            field: key.to_string(),
            op: CompareOp::In,
            value: Value::Array(ids),
        }])
        .with_fields(fields);
        query.sort = vec![SortKey::parse(&related.default_sort), SortKey::parse(ID_FIELD)];
        query
    }

    async fn expand_to_one(
        &self,
        docs: &mut [Value],
        spec: &ExpandSpec,
        related: &ResourceDescriptor,
        local_field: &str,
    ) -> Result<(), AppError> {
        let mut ids: Vec<Value> = docs
            .iter()
            .filter_map(|d| d.get(local_field).filter(|v| v.is_string()).cloned())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        ids.dedup();
        if ids.is_empty() {
            return Ok(());
        }
        let query = Self::related_query(related, spec, ID_FIELD, ids);
        let found: HashMap<String, Value> = self
            .store
            .find(related, &query)
            .await?
            .into_iter()
            .filter_map(|d| d.get(ID_FIELD).and_then(Value::as_str).map(str::to_string).map(|id| (id, d)))
            .collect();
        for doc in docs.iter_mut() {
            let Some(map) = doc.as_object_mut() else { continue };
            let Some(key) = map.get(local_field).and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            map.insert(spec.name.clone(), found.get(&key).cloned().unwrap_or(Value::Null));
        }
        Ok(())
    }

    async fn expand_to_many(
        &self,
        docs: &mut [Value],
        spec: &ExpandSpec,
        related: &ResourceDescriptor,
        foreign_field: &str,
    ) -> Result<(), AppError> {
        let ids: Vec<Value> = docs.iter().filter_map(|d| d.get(ID_FIELD).cloned()).collect();
        if ids.is_empty() {
            return Ok(());
        }
        let query = Self::related_query(related, spec, foreign_field, ids);
        let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
        for d in self.store.find(related, &query).await? {
            if let Some(owner) = d.get(foreign_field).and_then(Value::as_str) {
                grouped.entry(owner.to_string()).or_default().push(d);
            }
        }
        for doc in docs.iter_mut() {
            let Some(map) = doc.as_object_mut() else { continue };
            let Some(id) = map.get(ID_FIELD).and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            map.insert(spec.name.clone(), Value::Array(grouped.remove(&id).unwrap_or_default()));
        }
        Ok(())
    }
}
