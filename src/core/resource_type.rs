//! Resource type descriptors and their builder
//!
//! A [`ResourceType`] is immutable once built. Types are declared through a
//! [`ResourceTypeBuilder`]; cloning a builder to derive a sibling type
//! copies its endpoint dictionary, so later changes to one never show up
//! in the other.

use crate::core::Properties;
use crate::core::endpoint::{CrudOperation, EndpointAction, EndpointDescriptor};
use crate::core::error::ConfigError;
use crate::core::field::Field;
use crate::core::manager::Manager;
use crate::core::naming::default_resource_name;
use crate::core::pagination::{COUNT, FILTERS, PAGINATION_PK};
use crate::core::relationship::Relationship;
use crate::core::routes::{fill_template, join_url_parts};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Link names built from a collection's `meta.links`
pub const NEXT: &str = "next";
pub const PREVIOUS: &str = "previous";

/// Static description of one kind of resource
#[derive(Clone)]
pub struct ResourceType {
    /// Unique registry key
    pub name: String,
    pub namespace: String,
    pub resource_name: String,
    pub primary_keys: Vec<String>,
    pub relationships: Vec<Relationship>,
    pub links: Vec<Relationship>,
    pub endpoints: IndexMap<String, EndpointDescriptor>,
    /// Restricts rendered properties when set
    pub public_fields: Option<Vec<String>>,
    pub manager: Option<Arc<dyn Manager>>,
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("name", &self.name)
            .field("base_url", &self.base_url())
            .field("relationships", &self.relationships)
            .field("links", &self.links)
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .field("has_manager", &self.manager.is_some())
            .finish()
    }
}

impl ResourceType {
    pub fn builder(name: impl Into<String>) -> ResourceTypeBuilder {
        ResourceTypeBuilder::new(name)
    }

    /// Collection url: `/namespace/resource_name`
    pub fn base_url_sans_pks(&self) -> String {
        join_url_parts(&[&self.namespace, &self.resource_name])
    }

    /// Item url template: `/namespace/resource_name/<pk1>/<pk2>`
    pub fn base_url(&self) -> String {
        let placeholders: Vec<String> = self
            .primary_keys
            .iter()
            .map(|pk| format!("<{}>", pk))
            .collect();
        let mut parts: Vec<&str> = vec![&self.namespace, &self.resource_name];
        parts.extend(placeholders.iter().map(String::as_str));
        join_url_parts(&parts)
    }

    /// Full route template of one of this type's endpoints
    pub fn endpoint_route(&self, endpoint: &EndpointDescriptor) -> String {
        let base = if endpoint.no_pks {
            self.base_url_sans_pks()
        } else {
            self.base_url()
        };
        join_url_parts(&[&base, &endpoint.route])
    }

    /// Route templates keyed by endpoint name
    pub fn endpoint_urls(&self) -> IndexMap<String, String> {
        self.endpoints
            .iter()
            .map(|(name, endpoint)| (name.clone(), self.endpoint_route(endpoint)))
            .collect()
    }

    /// Item path for a set of properties; `None` when a key is missing
    pub fn item_path(&self, properties: &Properties) -> Option<String> {
        fill_template(&self.base_url(), properties)
    }

    /// Primary keys absent (or null) in `properties`
    pub fn missing_pks(&self, properties: &Properties) -> Vec<String> {
        self.primary_keys
            .iter()
            .filter(|pk| properties.get(*pk).is_none_or(Value::is_null))
            .cloned()
            .collect()
    }

    /// Declared fields for the primary keys; undeclared keys are strings
    pub fn pk_fields(&self) -> Vec<Field> {
        let declared = self.manager.as_ref().map(|m| m.fields()).unwrap_or(&[]);
        self.primary_keys
            .iter()
            .map(|pk| {
                declared
                    .iter()
                    .find(|field| &field.name == pk)
                    .cloned()
                    .unwrap_or_else(|| Field::string(pk.clone()))
                    .required()
            })
            .collect()
    }

    pub fn has_operation(&self, op: CrudOperation) -> bool {
        self.endpoints
            .values()
            .any(|endpoint| endpoint.crud_operation() == Some(op))
    }

    /// Whether a property key may be rendered
    pub fn is_public(&self, key: &str) -> bool {
        if key.starts_with('_') {
            return false;
        }
        match &self.public_fields {
            Some(fields) => fields.iter().any(|f| f == key),
            None => true,
        }
    }
}

/// Declares a [`ResourceType`]
///
/// ```rust,ignore
/// let person = ResourceType::builder("Person")
///     .primary_keys(["id"])
///     .manager(Arc::new(InMemoryManager::new("Person", fields, ["id"])))
///     .crud(CrudOperation::ALL)
///     .relationship(Relationship::many("addresses", "Address").embedded());
/// registry.declare(person)?;
/// ```
#[derive(Clone)]
pub struct ResourceTypeBuilder {
    name: String,
    namespace: String,
    resource_name: Option<String>,
    primary_keys: Vec<String>,
    relationships: Vec<Relationship>,
    links: Vec<Relationship>,
    endpoints: IndexMap<String, EndpointDescriptor>,
    public_fields: Option<Vec<String>>,
    manager: Option<Arc<dyn Manager>>,
}

impl ResourceTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            resource_name: None,
            primary_keys: Vec::new(),
            relationships: Vec::new(),
            links: Vec::new(),
            endpoints: IndexMap::new(),
            public_fields: None,
            manager: None,
        }
    }

    /// Rename the type; useful when deriving a sibling from a clone
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn resource_name(mut self, resource_name: impl Into<String>) -> Self {
        self.resource_name = Some(resource_name.into());
        self
    }

    pub fn primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn manager(mut self, manager: Arc<dyn Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn link(mut self, link: Relationship) -> Self {
        self.links.push(link);
        self
    }

    pub fn endpoint(mut self, op: CrudOperation) -> Self {
        self.endpoints
            .insert(op.name().to_string(), EndpointDescriptor::crud(op));
        self
    }

    pub fn crud(self, ops: impl IntoIterator<Item = CrudOperation>) -> Self {
        ops.into_iter().fold(self, Self::endpoint)
    }

    /// Add or replace an endpoint by name
    pub fn custom_endpoint(mut self, endpoint: EndpointDescriptor) -> Self {
        self.endpoints.insert(endpoint.name.clone(), endpoint);
        self
    }

    pub fn public_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finish the declaration
    ///
    /// CRUD endpoints get their fields from the manager. A type exposing
    /// `retrieve_list` also gets an embedded many-relationship to itself
    /// named after its `resource_name`, plus `next`/`previous` links.
    pub fn build(self) -> Result<ResourceType, ConfigError> {
        let resource_name = self
            .resource_name
            .unwrap_or_else(|| default_resource_name(&self.name));
        let mut endpoints = self.endpoints;
        let mut relationships = self.relationships;
        let mut links = self.links;
        let mut has_list = false;

        for endpoint in endpoints.values_mut() {
            let EndpointAction::Crud(op) = endpoint.action else {
                continue;
            };
            let manager = self.manager.as_ref().ok_or_else(|| ConfigError::MissingManager {
                resource: self.name.clone(),
                operation: op.name().to_string(),
            })?;
            endpoint.fields = op.fields(manager.as_ref());
            has_list |= op == CrudOperation::RetrieveList;
        }

        if has_list {
            if !relationships.iter().any(|r| r.name == resource_name) {
                relationships.push(Relationship::many(&resource_name, &self.name).embedded());
            }
            for name in [NEXT, PREVIOUS] {
                if !links.iter().any(|l| l.name == name) {
                    links.push(
                        Relationship::one(name, &self.name)
                            .no_pks()
                            .query_args([PAGINATION_PK, COUNT, FILTERS]),
                    );
                }
            }
        }

        Ok(ResourceType {
            name: self.name,
            namespace: self.namespace,
            resource_name,
            primary_keys: self.primary_keys,
            relationships,
            links,
            endpoints,
            public_fields: self.public_fields,
            manager: self.manager,
        })
    }
}

impl fmt::Debug for ResourceTypeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTypeBuilder")
            .field("name", &self.name)
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget() -> ResourceType {
        ResourceType::builder("Widget")
            .namespace("/api")
            .resource_name("widget")
            .primary_keys(["id"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_urls() {
        let widget = widget();
        assert_eq!(widget.base_url(), "/api/widget/<id>");
        assert_eq!(widget.base_url_sans_pks(), "/api/widget");
    }

    #[test]
    fn test_composite_keys_in_order() {
        let line = ResourceType::builder("OrderLine")
            .primary_keys(["order_id", "line"])
            .build()
            .unwrap();
        assert_eq!(line.resource_name, "order_lines");
        assert_eq!(line.base_url(), "/order_lines/<order_id>/<line>");
        let props = json!({"order_id": 3, "line": "a"});
        assert_eq!(
            line.item_path(props.as_object().unwrap()),
            Some("/order_lines/3/a".to_string())
        );
    }

    #[test]
    fn test_missing_pks() {
        let widget = widget();
        let props = json!({"id": null, "name": "x"});
        assert_eq!(widget.missing_pks(props.as_object().unwrap()), vec!["id"]);
        let props = json!({"id": 1});
        assert!(widget.missing_pks(props.as_object().unwrap()).is_empty());
    }

    #[test]
    fn test_crud_without_manager_is_rejected() {
        let err = ResourceType::builder("Widget")
            .endpoint(CrudOperation::Create)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingManager { .. }));
    }

    #[test]
    fn test_public_keys() {
        let mut widget = widget();
        assert!(widget.is_public("name"));
        assert!(!widget.is_public("_secret"));
        widget.public_fields = Some(vec!["id".to_string()]);
        assert!(widget.is_public("id"));
        assert!(!widget.is_public("name"));
    }
}
