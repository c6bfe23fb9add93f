//! Resolved catalog: config validated and flattened for runtime use.

use crate::case::to_snake_case;
use crate::config::{validate, CatalogConfig, FieldConfig, FieldKind, ResourceConfig, ValidationRule};
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Query keys that never become filter constraints, whatever the resource.
pub const RESERVED_QUERY_KEYS: &[&str] = &["page", "sort", "limit", "fields"];

/// The four resource kinds the HTTP surface is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Tours,
    Users,
    Reviews,
    Bookings,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Tours,
        ResourceKind::Users,
        ResourceKind::Reviews,
        ResourceKind::Bookings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Tours => "tours",
            ResourceKind::Users => "users",
            ResourceKind::Reviews => "reviews",
            ResourceKind::Bookings => "bookings",
        }
    }
}

/// Direction of an expansion: to_one (we hold their id) or to_many (they hold ours).
#[derive(Clone, Debug)]
pub enum ExpandDirection {
    ToOne { local_field: String },
    ToMany { foreign_field: String },
}

#[derive(Clone, Debug)]
pub struct ExpandSpec {
    pub name: String,
    pub resource: String,
    pub direction: ExpandDirection,
    /// Fields of the related document to embed; `id` is always included.
    pub fields: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    /// API name (camelCase).
    pub name: String,
    /// Storage column (snake_case).
    pub column: String,
    pub kind: FieldKind,
    pub default: Option<Value>,
    pub hidden: bool,
    pub writable: bool,
    pub unique: bool,
    pub lowercase: bool,
    /// Filled by the store on insert (`id`, `createdAt`).
    pub generated: bool,
    pub validation: ValidationRule,
}

impl FieldInfo {
    fn from_config(c: &FieldConfig) -> Self {
        FieldInfo {
            name: c.name.clone(),
            column: to_snake_case(&c.name),
            kind: c.kind,
            default: c.default.clone(),
            hidden: c.hidden,
            writable: c.writable,
            unique: c.unique,
            lowercase: c.lowercase,
            generated: false,
            validation: c.validation.clone(),
        }
    }

    fn generated(name: &str, kind: FieldKind) -> Self {
        FieldInfo {
            name: name.to_string(),
            column: to_snake_case(name),
            kind,
            default: None,
            hidden: false,
            writable: false,
            unique: false,
            lowercase: false,
            generated: true,
            validation: ValidationRule::default(),
        }
    }

    /// Scalar fields can appear in filters and sort keys.
    pub fn is_queryable(&self) -> bool {
        self.kind.is_scalar()
    }
}

#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    pub name: String,
    pub table: String,
    /// `id` first, then configured fields, then `createdAt`.
    pub fields: Vec<FieldInfo>,
    pub unique_together: Vec<Vec<String>>,
    pub search_key: String,
    pub search_fields: Vec<String>,
    pub default_sort: String,
    pub slug_from: Option<String>,
    pub expands: Vec<ExpandSpec>,
}

impl ResourceDescriptor {
    fn from_config(c: &ResourceConfig) -> Self {
        let mut fields = vec![FieldInfo::generated(ID_FIELD, FieldKind::Uuid)];
        fields.extend(c.fields.iter().map(FieldInfo::from_config));
        fields.push(FieldInfo::generated(CREATED_AT_FIELD, FieldKind::Timestamp));
        let expands = c
            .expand
            .iter()
            .map(|e| ExpandSpec {
                name: e.name.clone(),
                resource: e.resource.clone(),
                direction: match (&e.local_field, &e.foreign_field) {
                    (Some(local), _) => ExpandDirection::ToOne {
                        local_field: local.clone(),
                    },
                    (None, Some(foreign)) => ExpandDirection::ToMany {
                        foreign_field: foreign.clone(),
                    },
                    // rejected by validate()
                    (None, None) => ExpandDirection::ToOne {
                        local_field: e.name.clone(),
                    },
                },
                fields: e.fields.clone(),
            })
            .collect();
        ResourceDescriptor {
            name: c.name.clone(),
            table: c.table.clone(),
            fields,
            unique_together: c.unique_together.clone(),
            search_key: c.search.key.clone(),
            search_fields: c.search.fields.clone(),
            default_sort: c.default_sort.clone(),
            slug_from: c.slug_from.clone(),
            expands,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn expand(&self, name: &str) -> Option<&ExpandSpec> {
        self.expands.iter().find(|e| e.name == name)
    }

    pub fn is_reserved_key(&self, key: &str) -> bool {
        RESERVED_QUERY_KEYS.contains(&key) || key == self.search_key
    }

    /// Field names returned when a query does not ask for specific fields.
    pub fn public_field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.hidden)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Remove hidden fields from a document before it leaves the service layer.
    pub fn strip_hidden(&self, doc: &mut Value) {
        if let Value::Object(map) = doc {
            for f in self.fields.iter().filter(|f| f.hidden) {
                map.remove(&f.name);
            }
        }
    }
}

/// Every resource descriptor, bound once at startup.
#[derive(Clone, Debug)]
pub struct Catalog {
    by_name: HashMap<String, Arc<ResourceDescriptor>>,
    tours: Arc<ResourceDescriptor>,
    users: Arc<ResourceDescriptor>,
    reviews: Arc<ResourceDescriptor>,
    bookings: Arc<ResourceDescriptor>,
}

impl Catalog {
    pub fn get(&self, kind: ResourceKind) -> &Arc<ResourceDescriptor> {
        match kind {
            ResourceKind::Tours => &self.tours,
            ResourceKind::Users => &self.users,
            ResourceKind::Reviews => &self.reviews,
            ResourceKind::Bookings => &self.bookings,
        }
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<ResourceDescriptor>> {
        self.by_name.get(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ResourceDescriptor>> {
        ResourceKind::ALL.into_iter().map(move |k| self.get(k))
    }
}

/// Validate and resolve the raw catalog.
pub fn resolve(config: &CatalogConfig) -> Result<Catalog, ConfigError> {
    validate(config)?;
    let by_name: HashMap<String, Arc<ResourceDescriptor>> = config
        .resources
        .iter()
        .map(|r| (r.name.clone(), Arc::new(ResourceDescriptor::from_config(r))))
        .collect();
    let take = |kind: ResourceKind| {
        by_name
            .get(kind.name())
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "resource",
                id: kind.name().to_string(),
            })
    };
    Ok(Catalog {
        tours: take(ResourceKind::Tours)?,
        users: take(ResourceKind::Users)?,
        reviews: take(ResourceKind::Reviews)?,
        bookings: take(ResourceKind::Bookings)?,
        by_name,
    })
}
