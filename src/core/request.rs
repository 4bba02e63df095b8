//! Transport-neutral request container handed to endpoint handlers

use crate::core::Properties;
use crate::core::error::ValidationError;
use crate::core::field::{Field, FieldKind};
use axum::http::Method;
use serde_json::Value;

/// Ordered query arguments; keys may repeat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgs(Vec<(String, String)>);

impl QueryArgs {
    /// Parse a raw `a=1&b=2` query string; malformed input yields no args
    pub fn parse(raw: &str) -> Self {
        Self(serde_urlencoded::from_str(raw).unwrap_or_default())
    }

    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Project the args onto declared fields as raw JSON values
    ///
    /// List fields collect every occurrence; other fields keep the first.
    pub fn to_properties(&self, fields: &[Field]) -> Properties {
        let mut props = Properties::new();
        for field in fields {
            let values = self.all(&field.name);
            if values.is_empty() {
                continue;
            }
            let raw = if field.kind == FieldKind::List {
                Value::Array(values.into_iter().map(Value::from).collect())
            } else {
                Value::from(values[0])
            };
            props.insert(field.name.clone(), raw);
        }
        props
    }
}

/// Everything an endpoint may read from the incoming request
#[derive(Debug, Clone)]
pub struct RequestContainer {
    pub method: Method,
    /// Values bound from the route template placeholders
    pub url_params: Properties,
    pub query_args: QueryArgs,
    pub body: Properties,
}

impl RequestContainer {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            url_params: Properties::new(),
            query_args: QueryArgs::default(),
            body: Properties::new(),
        }
    }

    pub fn with_url_params(mut self, url_params: Properties) -> Self {
        self.url_params = url_params;
        self
    }

    pub fn with_query(mut self, query_args: QueryArgs) -> Self {
        self.query_args = query_args;
        self
    }

    pub fn with_body(mut self, body: Properties) -> Self {
        self.body = body;
        self
    }

    /// Parse a JSON request body; an empty body is an empty object
    pub fn parse_body(bytes: &[u8]) -> Result<Properties, ValidationError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Properties::new());
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ValidationError::InvalidBody {
                message: format!("expected an object, got {}", json_type(&other)),
            }),
            Err(e) => Err(ValidationError::InvalidBody {
                message: e.to_string(),
            }),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
