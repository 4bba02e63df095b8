//! Realized resources and their lazily expanded relationship tree
//!
//! A [`Resource`] holds the properties an endpoint produced for one response.
//! Its relationships and links are expanded on first access and cached for
//! the rest of the request. Expansion only follows keys actually present in
//! the property tree, so it terminates for any finite input even when the
//! declared types reference each other.

use crate::core::Properties;
use crate::core::error::{ErrorDetail, ErrorOrigin, RelationshipError};
use crate::core::field::FieldSummary;
use crate::core::pagination::{encode_query, flatten_param, param_value};
use crate::core::registry::{ResourceRegistry, ResourceTypeId};
use crate::core::relationship::RelatedResource;
use crate::core::resource_type::ResourceType;
use crate::core::routes::fill_template;
use axum::http::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Response metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    /// Properties of link resources (`next`, `previous`, ...) keyed by link name
    pub links: Properties,
    /// Free-form metadata rendered by formats that have a place for it
    pub extra: Properties,
}

/// Result of expanding a resource's relationships and links
#[derive(Debug)]
pub struct Expansion {
    /// Parent properties minus every key consumed by a relationship
    pub properties: Properties,
    pub related: Vec<RelatedResource>,
    pub linked: Vec<RelatedResource>,
}

/// An endpoint reachable from a resource, with its placeholders filled
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAction {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub fields: Vec<FieldSummary>,
}

/// One realized resource of a registered type
pub struct Resource {
    registry: Arc<ResourceRegistry>,
    type_id: ResourceTypeId,
    properties: Properties,
    status: StatusCode,
    errors: Vec<ErrorDetail>,
    meta: Meta,
    no_pks: bool,
    include_relationships: bool,
    query_args: Vec<String>,
    origin: ErrorOrigin,
    expansion: OnceLock<Result<Expansion, RelationshipError>>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type", &self.resource_type().name)
            .field("status", &self.status)
            .field("properties", &self.properties)
            .field("meta", &self.meta)
            .field("no_pks", &self.no_pks)
            .finish()
    }
}

impl Resource {
    pub fn new(registry: Arc<ResourceRegistry>, type_id: ResourceTypeId, properties: Properties) -> Self {
        Self {
            registry,
            type_id,
            properties,
            status: StatusCode::OK,
            errors: Vec::new(),
            meta: Meta::default(),
            no_pks: false,
            include_relationships: true,
            query_args: Vec::new(),
            origin: ErrorOrigin::Server,
            expansion: OnceLock::new(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_error(mut self, error: ErrorDetail) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_meta_links(mut self, links: Properties) -> Self {
        self.meta.links = links;
        self.expansion = OnceLock::new();
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.extra.insert(key.into(), value);
        self
    }

    pub fn with_query_args(mut self, query_args: Vec<String>) -> Self {
        self.query_args = query_args;
        self
    }

    /// Mark where the properties came from; decides the status of
    /// relationship construction failures
    pub fn with_origin(mut self, origin: ErrorOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// The resource has no identity of its own and links to the collection
    pub fn without_pks(mut self) -> Self {
        self.no_pks = true;
        self
    }

    /// Render as a reference only; relationships are not expanded
    pub fn without_relationships(mut self) -> Self {
        self.include_relationships = false;
        self
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn type_id(&self) -> ResourceTypeId {
        self.type_id
    }

    pub fn resource_type(&self) -> &ResourceType {
        self.registry.get(self.type_id)
    }

    /// The properties as produced, relationship data included
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn errors(&self) -> &[ErrorDetail] {
        &self.errors
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn no_pks(&self) -> bool {
        self.no_pks
    }

    pub fn includes_relationships(&self) -> bool {
        self.include_relationships
    }

    /// Whether every format renders this resource as an empty body
    pub fn is_empty_body(&self) -> bool {
        self.status == StatusCode::NO_CONTENT
    }

    /// Expand relationships and links, once
    pub fn expansion(&self) -> Result<&Expansion, RelationshipError> {
        self.expansion
            .get_or_init(|| self.expand())
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn related_resources(&self) -> Result<&[RelatedResource], RelationshipError> {
        Ok(&self.expansion()?.related)
    }

    pub fn linked_resources(&self) -> Result<&[RelatedResource], RelationshipError> {
        Ok(&self.expansion()?.linked)
    }

    /// Remaining properties that may go on the wire
    pub fn public_properties(&self) -> Result<Properties, RelationshipError> {
        let resource_type = self.resource_type();
        Ok(self
            .expansion()?
            .properties
            .iter()
            .filter(|(key, _)| resource_type.is_public(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn expand(&self) -> Result<Expansion, RelationshipError> {
        let resource_type = self.resource_type();
        let mut remaining = self.properties.clone();
        let mut related = Vec::new();
        if self.include_relationships {
            for (relationship, target) in self.registry.relationships(self.type_id) {
                if let Some(child) = relationship.construct(
                    &self.registry,
                    target,
                    &resource_type.name,
                    &self.properties,
                    &mut remaining,
                    self.origin,
                )? {
                    related.push(child);
                }
            }
        }

        let mut unused_links = self.meta.links.clone();
        let mut linked = Vec::new();
        for (link, target) in self.registry.links(self.type_id) {
            if let Some(child) = link.construct(
                &self.registry,
                target,
                &resource_type.name,
                &self.meta.links,
                &mut unused_links,
                self.origin,
            )? {
                linked.push(child);
            }
        }

        Ok(Expansion {
            properties: remaining,
            related,
            linked,
        })
    }

    /// Primary key values in declaration order, as url segments
    pub fn pk_values(&self) -> Vec<String> {
        self.resource_type()
            .primary_keys
            .iter()
            .filter_map(|pk| self.properties.get(pk))
            .filter(|value| !value.is_null())
            .map(param_value)
            .collect()
    }

    /// Primary keys joined by `/`; empty for resources without identity
    pub fn id_string(&self) -> String {
        if self.no_pks {
            return String::new();
        }
        self.pk_values().join("/")
    }

    /// Path of this resource relative to the server base url
    ///
    /// Item path when all primary keys are known, collection path otherwise,
    /// followed by the encoded query args if any are set.
    pub fn path(&self) -> String {
        let resource_type = self.resource_type();
        let mut path = if self.no_pks {
            resource_type.base_url_sans_pks()
        } else {
            resource_type
                .item_path(&self.properties)
                .unwrap_or_else(|| resource_type.base_url_sans_pks())
        };

        let mut pairs = Vec::new();
        for key in &self.query_args {
            if let Some(value) = self.properties.get(key) {
                flatten_param(key, value, &mut pairs);
            }
        }
        if !pairs.is_empty() {
            path.push('?');
            path.push_str(&encode_query(pairs));
        }
        path
    }

    /// Absolute url under `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }

    /// Endpoints whose route placeholders can all be filled from this resource
    pub fn actions(&self) -> Vec<ResourceAction> {
        let resource_type = self.resource_type();
        let mut actions = Vec::new();
        for endpoint in resource_type.endpoints.values() {
            let template = resource_type.endpoint_route(endpoint);
            let Some(path) = fill_template(&template, &self.properties) else {
                continue;
            };
            for method in &endpoint.methods {
                actions.push(ResourceAction {
                    name: endpoint.name.clone(),
                    method: method.clone(),
                    path: path.clone(),
                    fields: endpoint.field_summaries(),
                });
            }
        }
        actions
    }
}
