//! Query feature pipeline: filter -> search -> sort -> field projection -> pagination.
//!
//! Stages run in that fixed order inside [`QueryFeatures::build`]; pagination has to see the
//! final sort or pages would not be deterministic.

use crate::config::{ResourceDescriptor, ID_FIELD};
use crate::error::AppError;
use crate::query::coerce::coerce_str;
use crate::query::model::{CollectionQuery, CompareOp, Condition, FilterSet, Projection, SortKey, TextSearch};
use crate::query::spec::{QuerySpec, QueryValue};
use serde_json::Value;

pub const DEFAULT_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 1000;

/// A bounded query plus the page window it was built for.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedQuery {
    pub query: CollectionQuery,
    pub page: u64,
    pub limit: u64,
}

impl PreparedQuery {
    /// Pages past the end of the result set are an error; page 1 of nothing is an empty page.
    pub fn ensure_page_exists(&self, total: u64) -> Result<(), AppError> {
        if self.page > 1 && self.query.skip >= total {
            return Err(AppError::PageNotFound);
        }
        Ok(())
    }
}

/// Pipeline state for one list request.
pub struct QueryFeatures<'a> {
    descriptor: &'a ResourceDescriptor,
    spec: &'a QuerySpec,
    query: CollectionQuery,
    page: u64,
    limit: u64,
}

impl<'a> QueryFeatures<'a> {
    pub fn build(descriptor: &'a ResourceDescriptor, spec: &'a QuerySpec) -> Result<PreparedQuery, AppError> {
        let mut features = QueryFeatures {
            descriptor,
            spec,
            query: CollectionQuery {
                filter: FilterSet::default(),
                sort: Vec::new(),
                projection: Projection::Fields(Vec::new()),
                skip: 0,
                limit: Some(DEFAULT_LIMIT),
            },
            page: 1,
            limit: DEFAULT_LIMIT,
        };
        features.filter()?;
        features.search();
        features.sort();
        features.limit_fields();
        features.paginate();
        Ok(PreparedQuery {
            query: features.query,
            page: features.page,
            limit: features.limit,
        })
    }

    fn filter(&mut self) -> Result<(), AppError> {
        for (key, value) in self.spec.iter() {
            if self.descriptor.is_reserved_key(key) {
                continue;
            }
            let (name, op) = split_operator(key)?;
            let Some(field) = self.descriptor.field(name) else {
                tracing::debug!(resource = %self.descriptor.name, key, "ignoring filter on unknown field");
                continue;
            };
            if field.hidden || !field.is_queryable() {
                tracing::debug!(resource = %self.descriptor.name, key, "ignoring filter on non-queryable field");
                continue;
            }
            let condition = match (op, value) {
                (None, QueryValue::Many(values)) => {
                    let items = values
                        .iter()
                        .map(|v| coerce_str(field, v.trim()))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(AppError::BadRequest)?;
                    Condition {
                        field: field.name.clone(),
                        op: CompareOp::In,
                        value: Value::Array(items),
                    }
                }
                (op, value) => Condition {
                    field: field.name.clone(),
                    op: op.unwrap_or(CompareOp::Eq),
                    value: coerce_str(field, value.last().trim()).map_err(AppError::BadRequest)?,
                },
            };
            self.query.filter.conditions.push(condition);
        }
        Ok(())
    }

    fn search(&mut self) {
        let Some(term) = self.spec.single(&self.descriptor.search_key) else {
            return;
        };
        if self.descriptor.search_fields.is_empty() {
            return;
        }
        self.query.filter.search = Some(TextSearch {
            term: term.to_string(),
            fields: self.descriptor.search_fields.clone(),
        });
    }

    fn sort(&mut self) {
        let requested = self.spec.single("sort").map(|s| self.sort_keys(s)).unwrap_or_default();
        let mut keys = if requested.is_empty() {
            self.sort_keys(&self.descriptor.default_sort)
        } else {
            requested
        };
        if !keys.iter().any(|k| k.field == ID_FIELD) {
            keys.push(SortKey {
                field: ID_FIELD.to_string(),
                descending: false,
            });
        }
        self.query.sort = keys;
    }

    fn sort_keys(&self, raw: &str) -> Vec<SortKey> {
        let mut keys: Vec<SortKey> = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let key = SortKey::parse(token);
            let sortable = self
                .descriptor
                .field(&key.field)
                .map(|f| f.is_queryable() && !f.hidden)
                .unwrap_or(false);
            if !sortable {
                tracing::debug!(resource = %self.descriptor.name, field = %key.field, "ignoring sort on unknown field");
                continue;
            }
            if !keys.iter().any(|k| k.field == key.field) {
                keys.push(key);
            }
        }
        keys
    }

    fn limit_fields(&mut self) {
        let public = self.descriptor.public_field_names();
        let Some(raw) = self.spec.single("fields") else {
            self.query.projection = Projection::Fields(public);
            return;
        };
        let tokens: Vec<&str> = raw.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
        let fields = if !tokens.is_empty() && tokens.iter().all(|t| t.starts_with('-')) {
            let excluded: Vec<&str> = tokens.iter().map(|t| t.trim_start_matches('-')).collect();
            public
                .into_iter()
                .filter(|f| f == ID_FIELD || !excluded.contains(&f.as_str()))
                .collect()
        } else {
            let mut fields = vec![ID_FIELD.to_string()];
            for t in tokens {
                if public.iter().any(|p| p == t) && !fields.iter().any(|f| f == t) {
                    fields.push(t.to_string());
                }
            }
            fields
        };
        self.query.projection = Projection::Fields(fields);
    }

    fn paginate(&mut self) {
        let page = self
            .spec
            .single("page")
            .and_then(|p| p.parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = self
            .spec
            .single("limit")
            .and_then(|l| l.parse::<u64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        self.page = page;
        self.limit = limit;
        self.query.skip = (page - 1).saturating_mul(limit);
        self.query.limit = Some(limit);
    }
}

/// `price[gte]` -> ("price", Some(Gte)); `price` -> ("price", None).
fn split_operator(key: &str) -> Result<(&str, Option<CompareOp>), AppError> {
    let Some(open) = key.find('[') else {
        return Ok((key, None));
    };
    let name = &key[..open];
    let token = key[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| AppError::BadRequest(format!("Malformed query key: {}", key)))?;
    let op = CompareOp::from_token(token)
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported operator '{}' on {}", token, name)))?;
    Ok((name, Some(op)))
}
