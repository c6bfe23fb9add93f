//! Convert serde_json::Value to something sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// Text rendering of a JSON value. Placeholders carry an explicit `::type` cast, so
/// PostgreSQL parses the text into the column type; NULL stays NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct PgBindValue(Option<String>);

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        PgBindValue(match v {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => Some(v.to_string()),
        })
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match &self.0 {
            None => Ok(IsNull::Yes),
            Some(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
        }
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
