//! Relationship descriptors and their expansion into child resources
//!
//! A relationship names a sub-tree of a parent's properties and the resource
//! type that sub-tree describes. The target is stored as a type *name* and
//! resolved by the registry when it is frozen, so two types may reference
//! each other regardless of declaration order.

use crate::core::Properties;
use crate::core::error::{ErrorOrigin, RelationshipError};
use crate::core::registry::{ResourceRegistry, ResourceTypeId};
use crate::core::resource::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// How many related resources a relationship holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// A named edge from one resource type to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    /// Name of the target resource type
    pub target: String,
    pub cardinality: Cardinality,
    /// Parent property -> child property, applied for `One` relationships
    pub property_map: Vec<(String, String)>,
    pub embedded: bool,
    pub required: bool,
    /// The child has no identity of its own (pagination links)
    pub no_pks: bool,
    /// Child properties appended to the child's url as query parameters
    pub query_args: Vec<String>,
}

impl Relationship {
    fn new(name: impl Into<String>, target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality,
            property_map: Vec::new(),
            embedded: false,
            required: false,
            no_pks: false,
            query_args: Vec::new(),
        }
    }

    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::One)
    }

    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Cardinality::Many)
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn no_pks(mut self) -> Self {
        self.no_pks = true;
        self
    }

    pub fn map_property(mut self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        self.property_map.push((parent.into(), child.into()));
        self
    }

    pub fn query_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Build the child resource(s) for this relationship
    ///
    /// `source` is the parent's original property map and is never modified;
    /// consumed keys are removed from `remaining`. Returns `Ok(None)` when
    /// the relationship is absent and not required.
    pub(crate) fn construct(
        &self,
        registry: &Arc<ResourceRegistry>,
        target: ResourceTypeId,
        owner: &str,
        source: &Properties,
        remaining: &mut Properties,
        origin: ErrorOrigin,
    ) -> Result<Option<RelatedResource>, RelationshipError> {
        let built = match self.cardinality {
            Cardinality::One => self
                .construct_one(registry, target, owner, source, remaining, origin)?
                .map(Related::One),
            Cardinality::Many => self
                .construct_many(registry, target, owner, source, remaining, origin)?
                .map(Related::Many),
        };
        Ok(built.map(|related| RelatedResource {
            name: self.name.clone(),
            embedded: self.embedded,
            related,
        }))
    }

    fn construct_one(
        &self,
        registry: &Arc<ResourceRegistry>,
        target: ResourceTypeId,
        owner: &str,
        source: &Properties,
        remaining: &mut Properties,
        origin: ErrorOrigin,
    ) -> Result<Option<Resource>, RelationshipError> {
        let target_type = registry.get(target);
        let mut child = Properties::new();
        let mut has_subtree = false;

        match source.get(&self.name) {
            Some(Value::Object(nested)) => {
                child.extend(nested.iter().map(|(k, v)| (k.clone(), v.clone())));
                has_subtree = true;
            }
            Some(Value::Null) | None => {}
            Some(scalar) if target_type.primary_keys.len() == 1 => {
                child.insert(target_type.primary_keys[0].clone(), scalar.clone());
            }
            Some(other) => {
                tracing::warn!(
                    resource = owner,
                    relationship = %self.name,
                    "ignoring non-object value {}",
                    other
                );
            }
        }
        remaining.shift_remove(&self.name);

        for (parent_field, child_field) in &self.property_map {
            if let Some(value) = source.get(parent_field).filter(|v| !v.is_null()) {
                child.insert(child_field.clone(), value.clone());
            }
            remaining.shift_remove(parent_field);
        }

        if child.is_empty() {
            return self.absent(target_type.primary_keys.clone(), owner, origin);
        }
        if !self.no_pks {
            let missing = target_type.missing_pks(&child);
            if !missing.is_empty() {
                return self.absent(missing, owner, origin);
            }
        }

        // A child made only of mapped parent keys has no sub-tree to expand.
        let expand = self.embedded && has_subtree;
        Ok(Some(self.child(registry, target, child, expand, origin)))
    }

    fn construct_many(
        &self,
        registry: &Arc<ResourceRegistry>,
        target: ResourceTypeId,
        owner: &str,
        source: &Properties,
        remaining: &mut Properties,
        origin: ErrorOrigin,
    ) -> Result<Option<Vec<Resource>>, RelationshipError> {
        let target_type = registry.get(target);
        remaining.shift_remove(&self.name);

        let items = match source.get(&self.name) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => {
                return self.absent(target_type.primary_keys.clone(), owner, origin);
            }
            Some(other) => {
                tracing::warn!(
                    resource = owner,
                    relationship = %self.name,
                    "expected a list, ignoring {}",
                    other
                );
                return Ok(None);
            }
        };

        let mut children = Vec::with_capacity(items.len());
        for item in items {
            let props = match item {
                Value::Object(props) => props.clone(),
                Value::Null => continue,
                scalar if target_type.primary_keys.len() == 1 => {
                    let mut props = Properties::new();
                    props.insert(target_type.primary_keys[0].clone(), scalar.clone());
                    props
                }
                other => {
                    tracing::warn!(
                        resource = owner,
                        relationship = %self.name,
                        "skipping non-object item {}",
                        other
                    );
                    continue;
                }
            };
            if !self.no_pks {
                let missing = target_type.missing_pks(&props);
                if !missing.is_empty() {
                    if self.required {
                        return Err(self.error(missing, owner, origin));
                    }
                    tracing::debug!(
                        resource = owner,
                        relationship = %self.name,
                        "skipping item without primary keys {:?}",
                        missing
                    );
                    continue;
                }
            }
            children.push(self.child(registry, target, props, self.embedded, origin));
        }
        Ok(Some(children))
    }

    fn child(
        &self,
        registry: &Arc<ResourceRegistry>,
        target: ResourceTypeId,
        properties: Properties,
        expand: bool,
        origin: ErrorOrigin,
    ) -> Resource {
        let mut child = Resource::new(Arc::clone(registry), target, properties)
            .with_query_args(self.query_args.clone())
            .with_origin(origin);
        if self.no_pks {
            child = child.without_pks();
        }
        if !expand {
            child = child.without_relationships();
        }
        child
    }

    fn absent<T>(
        &self,
        missing: Vec<String>,
        owner: &str,
        origin: ErrorOrigin,
    ) -> Result<Option<T>, RelationshipError> {
        if self.required {
            Err(self.error(missing, owner, origin))
        } else {
            Ok(None)
        }
    }

    fn error(&self, missing: Vec<String>, owner: &str, origin: ErrorOrigin) -> RelationshipError {
        RelationshipError {
            resource: owner.to_string(),
            relationship: self.name.clone(),
            missing,
            origin,
        }
    }
}

/// The child side of an expanded relationship
#[derive(Debug)]
pub enum Related {
    One(Resource),
    Many(Vec<Resource>),
}

impl Related {
    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        match self {
            Related::One(resource) => std::slice::from_ref(resource).iter(),
            Related::Many(resources) => resources.iter(),
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Related::Many(_))
    }
}

/// One entry of a resource's related or linked resources
#[derive(Debug)]
pub struct RelatedResource {
    pub name: String,
    pub embedded: bool,
    pub related: Related,
}
