//! Store-neutral collection query: what the pipeline produces and every store executes.

use serde_json::Value;
use std::cmp::Ordering;

/// Comparison applied by a filter condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value is a JSON array; matches when the field equals any element.
    In,
}

impl CompareOp {
    /// Operator token as written in a query key, e.g. `price[gte]`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::In => "IN",
        }
    }

    /// Evaluate against an already-typed field value.
    pub fn matches(self, field: &Value, target: &Value) -> bool {
        match self {
            CompareOp::In => target
                .as_array()
                .map(|items| items.iter().any(|t| compare_values(field, t) == Some(Ordering::Equal)))
                .unwrap_or(false),
            op => match compare_values(field, target) {
                Some(ord) => match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Lte => ord != Ordering::Greater,
                    CompareOp::In => false,
                },
                None => false,
            },
        }
    }
}

/// Order two scalar JSON values of the same type. Mixed types and nulls are unordered,
/// except in [`sort_order`] which places nulls first.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: nulls (and missing values) before everything else.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Condition {
            field: field.into(),
            op: CompareOp::Eq,
            value,
        }
    }
}

/// Case-insensitive substring match over any of `fields`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextSearch {
    pub term: String,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSet {
    pub conditions: Vec<Condition>,
    pub search: Option<TextSearch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix('-') {
            Some(field) => SortKey {
                field: field.to_string(),
                descending: true,
            },
            None => SortKey {
                field: token.to_string(),
                descending: false,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    /// Every stored field, hidden ones included. Internal use only.
    All,
    Fields(Vec<String>),
}

impl Projection {
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Projection::All => true,
            Projection::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CollectionQuery {
    pub filter: FilterSet,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    /// `None` fetches every match (internal report queries).
    pub limit: Option<u64>,
}

impl CollectionQuery {
    /// Every document, every field, in storage order.
    pub fn all() -> Self {
        CollectionQuery {
            filter: FilterSet::default(),
            sort: Vec::new(),
            projection: Projection::All,
            skip: 0,
            limit: None,
        }
    }

    pub fn matching(conditions: Vec<Condition>) -> Self {
        CollectionQuery {
            filter: FilterSet {
                conditions,
                search: None,
            },
            ..Self::all()
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.projection = Projection::Fields(fields);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_comparisons() {
        assert!(CompareOp::Gte.matches(&json!(100), &json!(100.0)));
        assert!(CompareOp::Gt.matches(&json!(101.5), &json!(100)));
        assert!(!CompareOp::Lt.matches(&json!(100), &json!(100)));
        assert!(CompareOp::Lte.matches(&json!(99), &json!(100)));
    }

    #[test]
    fn mixed_types_never_match() {
        assert!(!CompareOp::Eq.matches(&json!("100"), &json!(100)));
        assert!(!CompareOp::Gte.matches(&Value::Null, &json!(1)));
    }

    #[test]
    fn membership() {
        assert!(CompareOp::In.matches(&json!("easy"), &json!(["easy", "medium"])));
        assert!(!CompareOp::In.matches(&json!("difficult"), &json!(["easy", "medium"])));
    }

    #[test]
    fn nulls_sort_first() {
        assert_eq!(sort_order(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(sort_order(Some(&json!(2)), Some(&json!(1))), Ordering::Greater);
    }

    #[test]
    fn sort_key_parsing() {
        assert_eq!(
            SortKey::parse("-price"),
            SortKey {
                field: "price".into(),
                descending: true
            }
        );
        assert!(!SortKey::parse("name").descending);
    }
}
