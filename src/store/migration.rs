//! DDL for the resource tables: one typed column per field, defaults, NOT NULL for
//! required fields, UNIQUE for unique fields and unique_together groups. Idempotent.

use crate::config::{Catalog, FieldInfo, FieldKind, ResourceDescriptor, CREATED_AT_FIELD, ID_FIELD};
use crate::sql::quoted;
use crate::store::StoreError;
use serde_json::Value;
use sqlx::PgPool;

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// SQL literal for a declared field default.
fn default_sql(field: &FieldInfo, value: &Value) -> Option<String> {
    match (field.kind, value) {
        (_, Value::Null) => None,
        (FieldKind::Json, v) => Some(format!("{}::jsonb", literal(&v.to_string()))),
        (_, Value::Bool(b)) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
        (_, Value::Number(n)) => Some(n.to_string()),
        (_, Value::String(s)) => Some(literal(s)),
        (_, v) => Some(literal(&v.to_string())),
    }
}

fn column_def(field: &FieldInfo) -> String {
    let mut def = format!("{} {}", quoted(&field.column), field.kind.pg_type());
    if field.name == ID_FIELD {
        def.push_str(" NOT NULL DEFAULT gen_random_uuid()");
        return def;
    }
    if field.name == CREATED_AT_FIELD {
        def.push_str(" NOT NULL DEFAULT NOW()");
        return def;
    }
    if field.validation.required == Some(true) {
        def.push_str(" NOT NULL");
    }
    if let Some(d) = field.default.as_ref().and_then(|v| default_sql(field, v)) {
        def.push_str(&format!(" DEFAULT {}", d));
    }
    def
}

pub fn create_table_sql(resource: &ResourceDescriptor) -> String {
    let mut parts: Vec<String> = resource.fields.iter().map(column_def).collect();
    parts.push(format!("PRIMARY KEY ({})", quoted(ID_FIELD)));
    for f in resource.fields.iter().filter(|f| f.unique) {
        parts.push(format!("UNIQUE ({})", quoted(&f.column)));
    }
    for group in &resource.unique_together {
        let cols: Vec<String> = group
            .iter()
            .filter_map(|name| resource.field(name))
            .map(|f| quoted(&f.column))
            .collect();
        parts.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quoted(&resource.table),
        parts.join(",\n    ")
    )
}

/// Create every resource table that does not exist yet.
pub async fn apply_migrations(pool: &PgPool, catalog: &Catalog) -> Result<(), StoreError> {
    for resource in catalog.descriptors() {
        let ddl = create_table_sql(resource);
        tracing::debug!(table = %resource.table, ddl = %ddl, "migrate");
        sqlx::query(&ddl).execute(pool).await?;
    }
    tracing::info!("resource tables ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ResourceKind};

    #[test]
    fn tours_table_has_typed_columns_and_constraints() {
        let catalog = resolve(&builtin_config().unwrap()).unwrap();
        let ddl = create_table_sql(catalog.get(ResourceKind::Tours));
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"tours\""));
        assert!(ddl.contains("\"id\" uuid NOT NULL DEFAULT gen_random_uuid()"));
        assert!(ddl.contains("\"max_group_size\" bigint NOT NULL"));
        assert!(ddl.contains("\"ratings_average\" double precision DEFAULT 4.5"));
        assert!(ddl.contains("\"images\" jsonb DEFAULT '[]'::jsonb"));
        assert!(ddl.contains("\"secret_tour\" boolean DEFAULT FALSE"));
        assert!(ddl.contains("\"created_at\" timestamptz NOT NULL DEFAULT NOW()"));
        assert!(ddl.contains("UNIQUE (\"name\")"));
    }

    #[test]
    fn reviews_table_has_compound_unique() {
        let catalog = resolve(&builtin_config().unwrap()).unwrap();
        let ddl = create_table_sql(catalog.get(ResourceKind::Reviews));
        assert!(ddl.contains("UNIQUE (\"tour\", \"user\")"));
    }
}
