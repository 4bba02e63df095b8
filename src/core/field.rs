//! Field declarations and value coercion
//!
//! A [`Field`] pairs a name with a [`FieldKind`] and a handful of
//! constraints. The coercion function is looked up once, when the field is
//! declared, from a static table indexed by kind; translating a value at
//! request time is a plain function call.

use crate::core::error::{FieldValidationError, TranslationError, ValidationError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum FieldKind {
    String = 0,
    Integer = 1,
    Float = 2,
    Boolean = 3,
    DateTime = 4,
    Uuid = 5,
    List = 6,
    Dict = 7,
}

/// Converts a raw JSON value into the canonical value for a kind
pub type Coercer = fn(&Value) -> Option<Value>;

const COERCION_TABLE: [Coercer; 8] = [
    coerce_string,
    coerce_integer,
    coerce_float,
    coerce_boolean,
    coerce_datetime,
    coerce_uuid,
    coerce_list,
    coerce_dict,
];

impl FieldKind {
    /// The coercion function registered for this kind
    pub fn coercer(self) -> Coercer {
        COERCION_TABLE[self as usize]
    }

    /// Name used in error messages and SIREN action fields
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime => "datetime",
            FieldKind::Uuid => "uuid",
            FieldKind::List => "list",
            FieldKind::Dict => "dict",
        }
    }
}

fn coerce_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => n
            .as_f64()
            // i64::MAX as f64 rounds up to 2^63, which is already out of range
            .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
            .map(|f| Value::from(f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<Value> {
    let float = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Number::from_f64(float).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_datetime(value: &Value) -> Option<Value> {
    let raw = value.as_str()?;
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    Some(Value::String(parsed.with_timezone(&Utc).to_rfc3339()))
}

fn coerce_uuid(value: &Value) -> Option<Value> {
    let raw = value.as_str()?;
    Uuid::parse_str(raw)
        .ok()
        .map(|id| Value::String(id.to_string()))
}

fn coerce_list(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value.clone()),
        Value::Null | Value::Object(_) => None,
        other => Some(Value::Array(vec![other.clone()])),
    }
}

fn coerce_dict(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => Some(parsed),
            _ => None,
        },
        _ => None,
    }
}

/// A declared input/output field
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    /// Minimum value for numbers, minimum length for strings and lists
    pub minimum: Option<f64>,
    /// Maximum value for numbers, maximum length for strings and lists
    pub maximum: Option<f64>,
    pub regex: Option<Regex>,
    coerce: Coercer,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            nullable: true,
            minimum: None,
            maximum: None,
            regex: None,
            coerce: kind.coercer(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Uuid)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn regex(mut self, regex: Regex) -> Self {
        self.regex = Some(regex);
        self
    }

    /// Coerce a value to this field's kind
    pub fn translate(&self, value: &Value) -> Result<Value, TranslationError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        (self.coerce)(value).ok_or_else(|| TranslationError {
            field: self.name.clone(),
            expected: self.kind.as_str(),
            value: value.to_string(),
        })
    }

    /// Check an already translated value against the field constraints
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let fail = |message: String| ValidationError::FieldError {
            field: self.name.clone(),
            message,
        };

        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else {
                Err(fail("may not be null".to_string()))
            };
        }

        let measured = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Some(s.chars().count() as f64),
            Value::Array(items) => Some(items.len() as f64),
            _ => None,
        };
        if let Some(size) = measured {
            if let Some(min) = self.minimum.filter(|min| size < *min) {
                return Err(fail(format!("must be at least {}", min)));
            }
            if let Some(max) = self.maximum.filter(|max| size > *max) {
                return Err(fail(format!("must be at most {}", max)));
            }
        }

        if let (Some(regex), Some(s)) = (&self.regex, value.as_str()) {
            if !regex.is_match(s) {
                return Err(fail(format!("must match {}", regex.as_str())));
            }
        }
        Ok(())
    }
}

/// Translate and validate `input` against `fields`
///
/// Keys without a declared field are dropped. With `skip_required` (partial
/// updates, filters) absent required fields are not reported. All field
/// failures are collected; the first translation failure aborts.
pub fn translate_fields(
    fields: &[Field],
    input: &Map<String, Value>,
    skip_required: bool,
) -> Result<Map<String, Value>, crate::core::RestGraphError> {
    let mut output = Map::new();
    let mut errors = Vec::new();

    for field in fields {
        let Some(raw) = input.get(&field.name) else {
            if field.required && !skip_required {
                errors.push(FieldValidationError {
                    field: field.name.clone(),
                    message: "is required".to_string(),
                });
            }
            continue;
        };
        let value = field.translate(raw)?;
        match field.validate(&value) {
            Ok(()) => {
                output.insert(field.name.clone(), value);
            }
            Err(ValidationError::FieldError { field, message }) => {
                errors.push(FieldValidationError { field, message })
            }
            Err(other) => return Err(other.into()),
        }
    }

    if errors.is_empty() {
        Ok(output)
    } else {
        Err(ValidationError::FieldErrors(errors).into())
    }
}

/// Short description of a field used by SIREN actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
}

impl From<&Field> for FieldSummary {
    fn from(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            kind: field.kind.as_str(),
            required: field.required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coercer_table_matches_kind_order() {
        assert_eq!(FieldKind::Integer.coercer()(&json!("42")), Some(json!(42)));
        assert_eq!(FieldKind::Boolean.coercer()(&json!("no")), Some(json!(false)));
        assert_eq!(FieldKind::List.coercer()(&json!(3)), Some(json!([3])));
        assert_eq!(FieldKind::Dict.coercer()(&json!("{\"a\":1}")), Some(json!({"a": 1})));
        assert_eq!(FieldKind::String.coercer()(&json!(7)), Some(json!("7")));
    }

    #[test]
    fn test_translate_integer_from_query_string() {
        let field = Field::integer("age");
        assert_eq!(field.translate(&json!("31")).unwrap(), json!(31));
        assert_eq!(field.translate(&json!(4.0)).unwrap(), json!(4));
        let err = field.translate(&json!("thirty")).unwrap_err();
        assert_eq!(err.expected, "integer");
        assert_eq!(err.field, "age");
    }

    #[test]
    fn test_integer_rejects_floats_outside_i64() {
        let field = Field::integer("age");
        assert_eq!(field.translate(&json!(42.0)).unwrap(), json!(42));
        assert_eq!(
            field.translate(&json!(-9_223_372_036_854_775_808.0)).unwrap(),
            json!(i64::MIN)
        );
        for value in [json!(1e30), json!(-1e30), json!(9_223_372_036_854_775_808.0)] {
            let err = field.translate(&value).unwrap_err();
            assert_eq!(err.expected, "integer");
        }
        assert!(field.translate(&json!(1.5)).is_err());
    }

    #[test]
    fn test_translate_uuid_and_datetime() {
        let id = Uuid::new_v4();
        assert_eq!(
            Field::uuid("id").translate(&json!(id.to_string())).unwrap(),
            json!(id.to_string())
        );
        assert!(Field::uuid("id").translate(&json!("nope")).is_err());

        let when = Field::new("when", FieldKind::DateTime);
        assert_eq!(
            when.translate(&json!("2024-01-15T10:00:00+02:00")).unwrap(),
            json!("2024-01-15T08:00:00+00:00")
        );
        assert!(when.translate(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_null_passes_translation_but_not_non_nullable_validation() {
        let field = Field::string("name").not_null();
        let value = field.translate(&Value::Null).unwrap();
        assert!(field.validate(&value).is_err());
        assert!(Field::string("nick").validate(&Value::Null).is_ok());
    }

    #[test]
    fn test_minimum_maximum_apply_to_numbers_and_lengths() {
        let age = Field::integer("age").minimum(0.0).maximum(150.0);
        assert!(age.validate(&json!(-1)).is_err());
        assert!(age.validate(&json!(151)).is_err());
        assert!(age.validate(&json!(30)).is_ok());

        let code = Field::string("code").minimum(2.0).maximum(3.0);
        assert!(code.validate(&json!("a")).is_err());
        assert!(code.validate(&json!("abcd")).is_err());
        assert!(code.validate(&json!("ab")).is_ok());
    }

    #[test]
    fn test_regex_constraint() {
        let field = Field::string("sku").regex(Regex::new(r"^[A-Z]{3}\d{3}$").unwrap());
        assert!(field.validate(&json!("ABC123")).is_ok());
        assert!(field.validate(&json!("abc123")).is_err());
    }

    #[test]
    fn test_translate_fields_collects_missing_required() {
        let fields = vec![
            Field::string("first_name").required(),
            Field::string("last_name").required(),
            Field::integer("age"),
        ];
        let input = json!({"age": "40", "unknown": true});
        let err = translate_fields(&fields, input.as_object().unwrap(), false).unwrap_err();
        match err {
            crate::core::RestGraphError::Validation(ValidationError::FieldErrors(errors)) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "first_name");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let partial = translate_fields(&fields, input.as_object().unwrap(), true).unwrap();
        assert_eq!(Value::Object(partial), json!({"age": 40}));
    }

    #[test]
    fn test_translate_fields_translation_error_short_circuits() {
        let fields = vec![Field::integer("age")];
        let input = json!({"age": "old"});
        let err = translate_fields(&fields, input.as_object().unwrap(), true).unwrap_err();
        assert!(matches!(err, crate::core::RestGraphError::Translation(_)));
    }
}
