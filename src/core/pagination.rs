//! Keyset pagination cursors
//!
//! A cursor is a pure value: the primary key tuple a page starts after, the
//! page size and the filters that were active. It serializes to a query
//! string whose parameters are sorted by key, so identical cursors always
//! produce byte-identical strings.
//!
//! ```text
//! count=10&last_name=Doe&pagination_pk=42&status=a&status=b
//! ```
//!
//! A filter may carry several values; they repeat the key in the order given.

use crate::core::Properties;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Query parameter carrying the page token; repeated for composite keys
pub const PAGINATION_PK: &str = "pagination_pk";

/// Query parameter overriding the page size
pub const COUNT: &str = "count";

/// Key under which cursor filters travel inside link properties
pub const FILTERS: &str = "filters";

/// Position of a page inside a filtered, key-ordered collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Primary key values the page starts after; empty means "from the start"
    pub page_token: Vec<String>,
    pub page_size: usize,
    pub filters: BTreeMap<String, Vec<String>>,
}

impl Cursor {
    pub fn new(page_token: Vec<String>, page_size: usize) -> Self {
        Self {
            page_token,
            page_size,
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filters(mut self, filters: BTreeMap<String, Vec<String>>) -> Self {
        self.filters = filters;
        self
    }

    /// Encode as a query string, parameters ordered by key
    pub fn encode(&self) -> String {
        encode_query(self.to_pairs())
    }

    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .page_token
            .iter()
            .map(|token| (PAGINATION_PK.to_string(), token.clone()))
            .collect();
        pairs.push((COUNT.to_string(), self.page_size.to_string()));
        for (key, values) in &self.filters {
            pairs.extend(values.iter().map(|value| (key.clone(), value.clone())));
        }
        pairs
    }

    /// Decode a query string produced by [`Cursor::encode`]
    ///
    /// Returns `None` when the string is malformed or `count` is missing or
    /// not a number.
    pub fn decode(query: &str) -> Option<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
        let mut cursor = Cursor::default();
        let mut page_size = None;
        for (key, value) in pairs {
            match key.as_str() {
                PAGINATION_PK => cursor.page_token.push(value),
                COUNT => page_size = Some(value.parse().ok()?),
                _ => cursor.filters.entry(key).or_default().push(value),
            }
        }
        cursor.page_size = page_size?;
        Some(cursor)
    }

    /// Properties for a `next`/`previous` link resource
    ///
    /// The link relationships declare `pagination_pk`, `count` and `filters`
    /// as query args, so the link's url carries exactly [`Cursor::encode`].
    pub fn to_link_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(PAGINATION_PK.to_string(), json!(self.page_token));
        props.insert(COUNT.to_string(), json!(self.page_size));
        props.insert(FILTERS.to_string(), json!(self.filters));
        props
    }
}

/// Render a filter value as a query-string value
pub fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a property into query pairs: objects spread their entries,
/// arrays repeat the key, null is dropped
pub fn flatten_param(key: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                flatten_param(key, item, out);
            }
        }
        Value::Object(entries) => {
            for (k, v) in entries {
                flatten_param(k, v, out);
            }
        }
        scalar => out.push((key.to_string(), param_value(scalar))),
    }
}

/// Encode pairs sorted by key; values of one key keep their relative order
pub fn encode_query(mut pairs: Vec<(String, String)>) -> String {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    serde_urlencoded::to_string(&pairs).unwrap_or_default()
}
