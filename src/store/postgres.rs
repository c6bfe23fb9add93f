//! PostgreSQL document store: one typed table per resource, queries from [`crate::sql`].

use crate::config::{FieldInfo, FieldKind, ResourceDescriptor};
use crate::query::coerce::format_timestamp;
use crate::query::{CollectionQuery, FilterSet};
use crate::sql::{self, PgBindValue, QueryBuf};
use crate::store::{Document, DocumentStore, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{ConnectOptions, PgPool, Row};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await.map_err(classify)?;
        row.map(|r| row_to_json(&r, &q.returns)).transpose()
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(classify)?;
        rows.iter().map(|r| row_to_json(r, &q.returns)).collect()
    }
}

/// Map constraint violations onto the store's error kinds by SQLSTATE.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => {
                let what = db.constraint().unwrap_or_else(|| db.message()).to_string();
                return StoreError::Duplicate(what);
            }
            Some("23502" | "23503" | "23514" | "22P02" | "22003" | "22007" | "22008") => {
                return StoreError::Constraint(db.message().to_string());
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn row_to_json(row: &PgRow, fields: &[FieldInfo]) -> Result<Value, StoreError> {
    let mut out = Map::new();
    for f in fields {
        out.insert(f.name.clone(), cell_to_value(row, f)?);
    }
    Ok(Value::Object(out))
}

fn cell_to_value(row: &PgRow, field: &FieldInfo) -> Result<Value, StoreError> {
    let col = field.column.as_str();
    let value = match field.kind {
        FieldKind::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(col)?
            .map(|u| Value::String(u.to_string())),
        FieldKind::Text => row.try_get::<Option<String>, _>(col)?.map(Value::String),
        FieldKind::Int => row.try_get::<Option<i64>, _>(col)?.map(Value::from),
        FieldKind::Float => row
            .try_get::<Option<f64>, _>(col)?
            .and_then(Number::from_f64)
            .map(Value::Number),
        FieldKind::Bool => row.try_get::<Option<bool>, _>(col)?.map(Value::Bool),
        FieldKind::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(col)?
            .map(|dt| Value::String(format_timestamp(dt))),
        FieldKind::Json => row.try_get::<Option<Value>, _>(col)?,
    };
    Ok(value.unwrap_or(Value::Null))
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(&self, resource: &ResourceDescriptor, doc: Document) -> Result<Value, StoreError> {
        let q = sql::insert(resource, &doc);
        self.fetch_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", resource.table)))
    }

    async fn find_by_id(&self, resource: &ResourceDescriptor, id: &str) -> Result<Option<Value>, StoreError> {
        self.fetch_optional(&sql::select_by_id(resource, id)).await
    }

    async fn find(&self, resource: &ResourceDescriptor, query: &CollectionQuery) -> Result<Vec<Value>, StoreError> {
        self.fetch_all(&sql::select_list(resource, query)).await
    }

    async fn count(&self, resource: &ResourceDescriptor, filter: &FilterSet) -> Result<u64, StoreError> {
        let q = sql::count(resource, filter);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let n = query.fetch_one(&self.pool).await.map_err(classify)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn update_by_id(
        &self,
        resource: &ResourceDescriptor,
        id: &str,
        patch: Document,
    ) -> Result<Option<Value>, StoreError> {
        self.fetch_optional(&sql::update(resource, id, &patch)).await
    }

    async fn delete_by_id(&self, resource: &ResourceDescriptor, id: &str) -> Result<Option<Value>, StoreError> {
        self.fetch_optional(&sql::delete(resource, id)).await
    }

    async fn delete_all(&self, resource: &ResourceDescriptor) -> Result<u64, StoreError> {
        let q = sql::delete_all(resource);
        tracing::debug!(sql = %q.sql, "query");
        let done = sqlx::query(&q.sql).execute(&self.pool).await.map_err(classify)?;
        Ok(done.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create the target database when it does not exist yet (connects to `postgres` first).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Backend("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_swaps_database_name() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/natours?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "natours");
    }
}
