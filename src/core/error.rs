//! Typed error handling for the restgraph framework
//!
//! Errors fall in two groups:
//!
//! - **Startup errors** ([`ConfigError`]): raised while resource types,
//!   routes and adapters are being declared. They are fatal; a process must
//!   not come up with a half-built registry.
//! - **Request errors** (everything else): recovered at the dispatcher
//!   boundary and rendered through the negotiated adapter's error document.
//!
//! Every error can be reduced to an [`ErrorDetail`], the minimum
//! `{status, code, message}` shape all adapters build on.
//!
//! # Example
//!
//! ```rust,ignore
//! match dispatcher.execute(route, request).await {
//!     Err(RestGraphError::NotFound(e)) => println!("missing: {}", e),
//!     Err(e) if e.is_startup_error() => panic!("misconfigured: {}", e),
//!     Err(e) => eprintln!("{} ({})", e, e.error_code()),
//!     Ok(resource) => { /* render */ }
//! }
//! ```

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Message rendered for every unexpected failure; the real cause is logged.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// The main error type for the restgraph framework
#[derive(Debug, Error)]
pub enum RestGraphError {
    /// Input failed a field constraint
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Input could not be coerced to the declared field type
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The manager found no matching entity
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// A required relationship could not be built
    #[error(transparent)]
    Relationship(#[from] RelationshipError),

    /// Startup-time configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Routing and request-shape errors
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The manager refused a write that clashes with stored data
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence backend failures
    #[error("manager failure: {0}")]
    Manager(#[source] anyhow::Error),

    /// Internal framework errors (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Minimum error document shared by every adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    /// HTTP status code
    pub status: u16,
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details (field errors, missing keys)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    /// The generic document used for unexpected failures
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            code: "INTERNAL_ERROR".to_string(),
            message: INTERNAL_ERROR_MESSAGE.to_string(),
            details: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl RestGraphError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestGraphError::Validation(_) => StatusCode::BAD_REQUEST,
            RestGraphError::Translation(_) => StatusCode::BAD_REQUEST,
            RestGraphError::NotFound(_) => StatusCode::NOT_FOUND,
            RestGraphError::Relationship(e) => e.status_code(),
            RestGraphError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestGraphError::Request(e) => e.status_code(),
            RestGraphError::Conflict(_) => StatusCode::CONFLICT,
            RestGraphError::Manager(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestGraphError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            RestGraphError::Validation(_) => "VALIDATION_ERROR",
            RestGraphError::Translation(_) => "TRANSLATION_ERROR",
            RestGraphError::NotFound(_) => "NOT_FOUND",
            RestGraphError::Relationship(_) => "RELATIONSHIP_CONSTRUCTION_ERROR",
            RestGraphError::Config(e) => e.error_code(),
            RestGraphError::Request(e) => e.error_code(),
            RestGraphError::Conflict(_) => "CONFLICT",
            RestGraphError::Manager(_) => "MANAGER_ERROR",
            RestGraphError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error can only happen while declaring the application
    pub fn is_startup_error(&self) -> bool {
        matches!(self, RestGraphError::Config(_))
    }

    /// Whether the message is safe to put on the wire
    ///
    /// Server-side failures are replaced by [`ErrorDetail::internal`].
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Reduce to the minimum error document
    pub fn to_detail(&self) -> ErrorDetail {
        if !self.is_client_error() {
            return ErrorDetail::internal();
        }
        ErrorDetail {
            status: self.status_code().as_u16(),
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            RestGraphError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            RestGraphError::Validation(ValidationError::FieldError { field, .. })
            | RestGraphError::Translation(TranslationError { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            RestGraphError::Relationship(e) => Some(serde_json::json!({
                "relationship": e.relationship,
                "missing": e.missing,
            })),
            _ => None,
        }
    }
}

// =============================================================================
// Validation / translation
// =============================================================================

/// A single field validation error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

/// Errors raised when input fails field constraints
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("validation error for field '{field}': {message}")]
    FieldError { field: String, message: String },

    #[error("validation errors: {}", format_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),

    #[error("request body must be a JSON object: {message}")]
    InvalidBody { message: String },
}

fn format_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raised when a value cannot be coerced to its declared kind
#[derive(Debug, Clone, Error)]
#[error("field '{field}' expects {expected}, got {value}")]
pub struct TranslationError {
    pub field: String,
    pub expected: &'static str,
    pub value: String,
}

// =============================================================================
// Lookup failures
// =============================================================================

/// The manager found nothing for the given lookup keys
#[derive(Debug, Clone, Error)]
#[error("{resource} matching {lookup} not found")]
pub struct NotFoundError {
    pub resource: String,
    pub lookup: String,
}

impl NotFoundError {
    pub fn new(resource: impl Into<String>, lookup: &crate::core::Properties) -> Self {
        Self {
            resource: resource.into(),
            lookup: serde_json::Value::Object(lookup.clone()).to_string(),
        }
    }
}

// =============================================================================
// Relationship construction
// =============================================================================

/// Where the inconsistent data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// The client supplied incomplete data
    Client,
    /// The manager returned incomplete data
    Server,
}

/// A required relationship could not be built from the available properties
#[derive(Debug, Clone, Error)]
#[error("relationship '{relationship}' of {resource} is missing primary keys {missing:?}")]
pub struct RelationshipError {
    pub resource: String,
    pub relationship: String,
    pub missing: Vec<String>,
    pub origin: ErrorOrigin,
}

impl RelationshipError {
    pub fn status_code(&self) -> StatusCode {
        match self.origin {
            ErrorOrigin::Client => StatusCode::BAD_REQUEST,
            ErrorOrigin::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// Startup configuration
// =============================================================================

/// Configuration errors; all of them abort startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("resource type '{new}' has the same base url '{url}' as '{existing}'")]
    DuplicateEndpoint {
        url: String,
        existing: String,
        new: String,
    },

    #[error("resource type '{name}' is declared twice")]
    DuplicateResourceType { name: String },

    #[error("unknown resource type '{name}' referenced by '{referenced_by}'")]
    UnknownResourceType { name: String, referenced_by: String },

    #[error("content type '{content_type}' is claimed by two adapters")]
    AdapterFormatConflict { content_type: String },

    #[error("no adapter registered for default format '{content_type}'")]
    UnknownDefaultFormat { content_type: String },

    #[error("no manager registered under '{key}' for resource type '{resource}'")]
    UnknownManager { key: String, resource: String },

    #[error("resource type '{resource}' declares {operation} but has no manager")]
    MissingManager {
        resource: String,
        operation: String,
    },

    #[error("failed to parse config{}: {message}", format_file(.file))]
    Parse {
        file: Option<String>,
        message: String,
    },
}

fn format_file(file: &Option<String>) -> String {
    file.as_ref()
        .map(|f| format!(" file '{}'", f))
        .unwrap_or_default()
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::DuplicateEndpoint { .. } => "DUPLICATE_ENDPOINT",
            ConfigError::DuplicateResourceType { .. } => "DUPLICATE_RESOURCE_TYPE",
            ConfigError::UnknownResourceType { .. } => "UNKNOWN_RESOURCE_TYPE",
            ConfigError::AdapterFormatConflict { .. } => "ADAPTER_FORMAT_CONFLICT",
            ConfigError::UnknownDefaultFormat { .. } => "UNKNOWN_DEFAULT_FORMAT",
            ConfigError::UnknownManager { .. } => "UNKNOWN_MANAGER",
            ConfigError::MissingManager { .. } => "MISSING_MANAGER",
            ConfigError::Parse { .. } => "CONFIG_PARSE_ERROR",
        }
    }
}

// =============================================================================
// Request routing
// =============================================================================

/// Errors related to matching a request to an endpoint
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("no route matches '{path}'")]
    UnknownRoute { path: String },

    #[error("method {method} is not allowed on '{path}'")]
    MethodNotAllowed { method: String, path: String },

    #[error("resource type '{resource}' has no endpoint '{endpoint}'")]
    UnknownEndpoint { resource: String, endpoint: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::UnknownRoute { .. } => StatusCode::NOT_FOUND,
            RequestError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::UnknownEndpoint { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::UnknownRoute { .. } => "ROUTE_NOT_FOUND",
            RequestError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            RequestError::UnknownEndpoint { .. } => "ENDPOINT_NOT_FOUND",
        }
    }
}

/// Result alias used across the crate
pub type Result<T, E = RestGraphError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_not_found_returns_404() {
        let err = RestGraphError::from(NotFoundError::new("person", &Map::new()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_validation_and_translation_return_400() {
        let validation = RestGraphError::from(ValidationError::FieldError {
            field: "age".to_string(),
            message: "must be at least 0".to_string(),
        });
        let translation = RestGraphError::from(TranslationError {
            field: "age".to_string(),
            expected: "integer",
            value: "\"abc\"".to_string(),
        });
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(translation.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_relationship_status_depends_on_origin() {
        let mut err = RelationshipError {
            resource: "post".to_string(),
            relationship: "author".to_string(),
            missing: vec!["id".to_string()],
            origin: ErrorOrigin::Client,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        err.origin = ErrorOrigin::Server;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_errors_never_leak_their_message() {
        let err = RestGraphError::Manager(anyhow::anyhow!("password=hunter2 connection refused"));
        let detail = err.to_detail();
        assert_eq!(detail.status, 500);
        assert_eq!(detail.message, INTERNAL_ERROR_MESSAGE);
        assert!(!detail.message.contains("hunter2"));
    }

    #[test]
    fn test_field_errors_carry_details() {
        let err = RestGraphError::from(ValidationError::FieldErrors(vec![
            FieldValidationError {
                field: "first_name".to_string(),
                message: "is required".to_string(),
            },
        ]));
        let detail = err.to_detail();
        assert_eq!(detail.status, 400);
        assert_eq!(
            detail.details,
            Some(json!({"fields": [{"field": "first_name", "message": "is required"}]}))
        );
    }

    #[test]
    fn test_config_errors_are_startup_errors() {
        let err = RestGraphError::from(ConfigError::AdapterFormatConflict {
            content_type: "application/json".to_string(),
        });
        assert!(err.is_startup_error());
        assert_eq!(err.error_code(), "ADAPTER_FORMAT_CONFLICT");
        assert!(!RestGraphError::Internal("x".to_string()).is_startup_error());
    }

    #[test]
    fn test_parse_error_mentions_file() {
        let err = ConfigError::Parse {
            file: Some("api.yaml".to_string()),
            message: "bad indent".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse config file 'api.yaml': bad indent"
        );
    }
}
