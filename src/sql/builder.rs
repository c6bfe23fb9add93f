//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resource descriptor.

use crate::config::{FieldInfo, FieldKind, ResourceDescriptor, ID_FIELD};
use crate::query::{CollectionQuery, CompareOp, FilterSet, Projection};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// SQL text, its parameters and the fields each returned row carries.
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
    pub returns: Vec<FieldInfo>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
            returns: Vec::new(),
        }
    }

    /// Placeholder cast to the column type; every parameter travels as text.
    fn placeholder(&mut self, v: Value, kind: FieldKind) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), kind.pg_type())
    }
}

fn all_fields(resource: &ResourceDescriptor) -> Vec<FieldInfo> {
    resource.fields.clone()
}

fn projected_fields(resource: &ResourceDescriptor, projection: &Projection) -> Vec<FieldInfo> {
    resource
        .fields
        .iter()
        .filter(|f| projection.includes(&f.name))
        .cloned()
        .collect()
}

fn column_list(fields: &[FieldInfo]) -> String {
    fields.iter().map(|f| quoted(&f.column)).collect::<Vec<_>>().join(", ")
}

fn id_field(resource: &ResourceDescriptor) -> FieldKind {
    resource.field(ID_FIELD).map(|f| f.kind).unwrap_or(FieldKind::Uuid)
}

/// `%`, `_` and the escape character itself are literal inside a search term.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

fn where_clause(resource: &ResourceDescriptor, filter: &FilterSet, q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for cond in &filter.conditions {
        let Some(field) = resource.field(&cond.field) else {
            continue;
        };
        let col = quoted(&field.column);
        match cond.op {
            CompareOp::In => {
                let items = cond.value.as_array().cloned().unwrap_or_default();
                if items.is_empty() {
                    parts.push("FALSE".to_string());
                    continue;
                }
                let phs: Vec<String> = items.into_iter().map(|v| q.placeholder(v, field.kind)).collect();
                parts.push(format!("{} IN ({})", col, phs.join(", ")));
            }
            op => {
                let ph = q.placeholder(cond.value.clone(), field.kind);
                parts.push(format!("{} {} {}", col, op.sql(), ph));
            }
        }
    }
    if let Some(search) = &filter.search {
        let ph = q.placeholder(Value::String(like_pattern(&search.term)), FieldKind::Text);
        let ors: Vec<String> = search
            .fields
            .iter()
            .filter_map(|f| resource.field(f))
            .map(|f| format!("{} ILIKE {}", quoted(&f.column), ph))
            .collect();
        if !ors.is_empty() {
            parts.push(format!("({})", ors.join(" OR ")));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// INSERT with only the provided columns so table defaults apply to the rest.
pub fn insert(resource: &ResourceDescriptor, doc: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&resource.table);
    let mut cols = Vec::new();
    let mut phs = Vec::new();
    for f in &resource.fields {
        if let Some(v) = doc.get(&f.name) {
            cols.push(quoted(&f.column));
            phs.push(q.placeholder(v.clone(), f.kind));
        }
    }
    q.returns = all_fields(resource);
    let returning = column_list(&q.returns);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            phs.join(", "),
            returning
        )
    };
    q
}

pub fn select_by_id(resource: &ResourceDescriptor, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(Value::String(id.to_string()), id_field(resource));
    q.returns = all_fields(resource);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        column_list(&q.returns),
        quoted(&resource.table),
        quoted(ID_FIELD),
        ph
    );
    q
}

/// SELECT with filter, search, ORDER BY and LIMIT/OFFSET. Nulls sort first ascending.
pub fn select_list(resource: &ResourceDescriptor, query: &CollectionQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.returns = projected_fields(resource, &query.projection);
    let where_sql = where_clause(resource, &query.filter, &mut q);
    let order: Vec<String> = query
        .sort
        .iter()
        .filter_map(|k| resource.field(&k.field).map(|f| (f, k.descending)))
        .map(|(f, desc)| {
            if desc {
                format!("{} DESC NULLS LAST", quoted(&f.column))
            } else {
                format!("{} ASC NULLS FIRST", quoted(&f.column))
            }
        })
        .collect();
    let mut sql = format!(
        "SELECT {} FROM {}{}",
        column_list(&q.returns),
        quoted(&resource.table),
        where_sql
    );
    if !order.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if query.skip > 0 {
        sql.push_str(&format!(" OFFSET {}", query.skip));
    }
    q.sql = sql;
    q
}

pub fn count(resource: &ResourceDescriptor, filter: &FilterSet) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, filter, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(&resource.table), where_sql);
    q
}

/// UPDATE of the patched columns; an empty patch degrades to a plain select.
pub fn update(resource: &ResourceDescriptor, id: &str, patch: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in resource.fields.iter().filter(|f| f.name != ID_FIELD) {
        if let Some(v) = patch.get(&f.name) {
            let ph = q.placeholder(v.clone(), f.kind);
            sets.push(format!("{} = {}", quoted(&f.column), ph));
        }
    }
    if sets.is_empty() {
        return select_by_id(resource, id);
    }
    let id_ph = q.placeholder(Value::String(id.to_string()), id_field(resource));
    q.returns = all_fields(resource);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(&resource.table),
        sets.join(", "),
        quoted(ID_FIELD),
        id_ph,
        column_list(&q.returns)
    );
    q
}

pub fn delete(resource: &ResourceDescriptor, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(Value::String(id.to_string()), id_field(resource));
    q.returns = all_fields(resource);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        quoted(&resource.table),
        quoted(ID_FIELD),
        ph,
        column_list(&q.returns)
    );
    q
}

pub fn delete_all(resource: &ResourceDescriptor) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("DELETE FROM {}", quoted(&resource.table));
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ResourceKind};
    use crate::query::{QueryFeatures, QuerySpec};
    use serde_json::json;

    fn tours() -> std::sync::Arc<ResourceDescriptor> {
        resolve(&builtin_config().unwrap()).unwrap().get(ResourceKind::Tours).clone()
    }

    #[test]
    fn list_query_is_parameterised() {
        let tours = tours();
        let spec = QuerySpec::from_pairs([
            ("difficulty", "easy"),
            ("price[lt]", "500"),
            ("sort", "-price"),
            ("fields", "name,price"),
            ("page", "2"),
            ("limit", "5"),
        ]);
        let prepared = QueryFeatures::build(&tours, &spec).unwrap();
        let q = select_list(&tours, &prepared.query);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\", \"price\" FROM \"tours\" \
             WHERE \"difficulty\" = $1::text AND \"price\" < $2::double precision \
             ORDER BY \"price\" DESC NULLS LAST, \"id\" ASC NULLS FIRST LIMIT 5 OFFSET 5"
        );
        assert_eq!(q.params, vec![json!("easy"), json!(500.0)]);
        assert_eq!(q.returns.len(), 3);
    }

    #[test]
    fn membership_and_search_share_the_where_clause() {
        let tours = tours();
        let spec = QuerySpec::from_pairs([("difficulty", "easy"), ("difficulty", "medium"), ("search", "50%")]);
        let prepared = QueryFeatures::build(&tours, &spec).unwrap();
        let q = count(&tours, &prepared.query.filter);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"tours\" WHERE \"difficulty\" IN ($1::text, $2::text) AND \
             (\"name\" ILIKE $3::text OR \"summary\" ILIKE $3::text OR \"description\" ILIKE $3::text)"
        );
        assert_eq!(q.params[2], json!("%50\\%%"));
    }

    #[test]
    fn insert_omits_absent_columns() {
        let tours = tours();
        let doc = json!({"name": "The Forest Hiker", "maxGroupSize": 25});
        let q = insert(&tours, doc.as_object().unwrap());
        assert!(q.sql.starts_with(
            "INSERT INTO \"tours\" (\"name\", \"max_group_size\") VALUES ($1::text, $2::bigint) RETURNING \"id\""
        ));
    }

    #[test]
    fn empty_patch_reads_the_row() {
        let tours = tours();
        let q = update(&tours, "00000000-0000-0000-0000-000000000000", &Map::new());
        assert!(q.sql.starts_with("SELECT "));
    }
}
