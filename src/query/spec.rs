//! Raw query-string parameters as received from the client.

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
    One(String),
    /// The key was repeated (`difficulty=easy&difficulty=medium`).
    Many(Vec<String>),
}

impl QueryValue {
    /// Last occurrence wins; repeated reserved keys collapse to one value this way.
    pub fn last(&self) -> &str {
        match self {
            QueryValue::One(v) => v,
            QueryValue::Many(vs) => vs.last().map(String::as_str).unwrap_or(""),
        }
    }
}

/// Parameter name -> value(s). Ordered so filters are built deterministically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySpec {
    params: BTreeMap<String, QueryValue>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut spec = QuerySpec::new();
        for (k, v) in pairs {
            spec.push(k.into(), v.into());
        }
        spec
    }

    fn push(&mut self, key: String, value: String) {
        match self.params.remove(&key) {
            None => {
                self.params.insert(key, QueryValue::One(value));
            }
            Some(QueryValue::One(first)) => {
                self.params.insert(key, QueryValue::Many(vec![first, value]));
            }
            Some(QueryValue::Many(mut values)) => {
                values.push(value);
                self.params.insert(key, QueryValue::Many(values));
            }
        }
    }

    /// Replace whatever the client sent for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), QueryValue::One(value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.get(key)
    }

    /// Single trimmed value for `key`; empty values count as absent.
    pub fn single(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.last().trim()).filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_collect() {
        let spec = QuerySpec::from_pairs([("difficulty", "easy"), ("difficulty", "medium"), ("price", "100")]);
        assert_eq!(
            spec.get("difficulty"),
            Some(&QueryValue::Many(vec!["easy".into(), "medium".into()]))
        );
        assert_eq!(spec.get("price"), Some(&QueryValue::One("100".into())));
    }

    #[test]
    fn single_takes_last_and_skips_blank() {
        let spec = QuerySpec::from_pairs([("sort", "price"), ("sort", "-price"), ("fields", "  ")]);
        assert_eq!(spec.single("sort"), Some("-price"));
        assert_eq!(spec.single("fields"), None);
        assert_eq!(spec.single("page"), None);
    }

    #[test]
    fn set_overrides_client_value() {
        let mut spec = QuerySpec::from_pairs([("limit", "50")]);
        spec.set("limit", "5");
        assert_eq!(spec.single("limit"), Some("5"));
    }
}
