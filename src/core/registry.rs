//! Two-phase resource type registry
//!
//! Phase one collects declarations in a [`RegistryBuilder`]; relationship
//! targets are plain names at that point, so types may reference each other
//! in any order. [`RegistryBuilder::freeze`] resolves every name, builds the
//! route table and hands out an immutable [`ResourceRegistry`] that is shared
//! read-only for the rest of the process.

use crate::config::RestGraphConfig;
use crate::core::Properties;
use crate::core::error::{ConfigError, RestGraphError};
use crate::core::manager::Manager;
use crate::core::relationship::Relationship;
use crate::core::resource::Resource;
use crate::core::resource_type::{ResourceType, ResourceTypeBuilder};
use crate::core::routes::{RouteTable, route_shape};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Index of a type inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceTypeId(usize);

impl ResourceTypeId {
    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Collects resource type declarations
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: Vec<ResourceType>,
    by_name: HashMap<String, usize>,
    by_base_url: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource type
    ///
    /// Fails if the name is taken or another type already owns the same
    /// base url (placeholder names are ignored when comparing).
    pub fn declare(&mut self, builder: ResourceTypeBuilder) -> Result<ResourceTypeId, ConfigError> {
        let resource_type = builder.build()?;

        if self.by_name.contains_key(&resource_type.name) {
            return Err(ConfigError::DuplicateResourceType {
                name: resource_type.name,
            });
        }
        let base_url = resource_type.base_url();
        let shape = route_shape(&base_url);
        if let Some(&existing) = self.by_base_url.get(&shape) {
            return Err(ConfigError::DuplicateEndpoint {
                url: base_url,
                existing: self.types[existing].name.clone(),
                new: resource_type.name,
            });
        }

        let index = self.types.len();
        tracing::debug!(
            resource = %resource_type.name,
            base_url = %base_url,
            endpoints = resource_type.endpoints.len(),
            "declared resource type"
        );
        self.by_name.insert(resource_type.name.clone(), index);
        self.by_base_url.insert(shape, index);
        self.types.push(resource_type);
        Ok(ResourceTypeId(index))
    }

    /// Declare every resource listed in a config file
    ///
    /// `managers` maps the `manager` key of each entry to an instance.
    pub fn declare_from_config(
        &mut self,
        config: &RestGraphConfig,
        managers: &HashMap<String, Arc<dyn Manager>>,
    ) -> Result<Vec<ResourceTypeId>, ConfigError> {
        config
            .resources
            .iter()
            .map(|resource| {
                let builder = resource.to_builder(managers)?;
                self.declare(builder)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Resolve every relationship target and compute the route table
    pub fn freeze(self) -> Result<Arc<ResourceRegistry>, ConfigError> {
        let resolve = |owner: &str, relationships: &[Relationship]| {
            relationships
                .iter()
                .map(|relationship| {
                    self.by_name
                        .get(&relationship.target)
                        .map(|&index| ResourceTypeId(index))
                        .ok_or_else(|| ConfigError::UnknownResourceType {
                            name: relationship.target.clone(),
                            referenced_by: owner.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let mut resolved = Vec::with_capacity(self.types.len());
        for resource_type in &self.types {
            resolved.push((
                resolve(&resource_type.name, &resource_type.relationships)?,
                resolve(&resource_type.name, &resource_type.links)?,
            ));
        }

        let routes = RouteTable::build(
            self.types
                .iter()
                .enumerate()
                .map(|(index, resource_type)| (ResourceTypeId(index), resource_type)),
        )?;

        let entries = self
            .types
            .into_iter()
            .zip(resolved)
            .map(|(resource_type, (relationship_targets, link_targets))| Entry {
                resource_type,
                relationship_targets,
                link_targets,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            resource_types = entries.len(),
            routes = routes.routes().len(),
            "resource registry frozen"
        );
        Ok(Arc::new(ResourceRegistry {
            entries,
            by_name: self
                .by_name
                .into_iter()
                .map(|(name, index)| (name, ResourceTypeId(index)))
                .collect(),
            routes,
        }))
    }
}

#[derive(Debug)]
struct Entry {
    resource_type: ResourceType,
    relationship_targets: Vec<ResourceTypeId>,
    link_targets: Vec<ResourceTypeId>,
}

/// Immutable, fully resolved set of resource types
#[derive(Debug)]
pub struct ResourceRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, ResourceTypeId>,
    routes: RouteTable,
}

impl ResourceRegistry {
    /// Look a type up by name
    pub fn resolve(&self, name: &str) -> Result<ResourceTypeId, ConfigError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownResourceType {
                name: name.to_string(),
                referenced_by: "lookup".to_string(),
            })
    }

    /// The descriptor behind an id handed out by this registry
    pub fn get(&self, id: ResourceTypeId) -> &ResourceType {
        &self.entries[id.0].resource_type
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceTypeId, &ResourceType)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (ResourceTypeId(index), &entry.resource_type))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Relationships of a type paired with their resolved targets
    pub fn relationships(
        &self,
        id: ResourceTypeId,
    ) -> impl Iterator<Item = (&Relationship, ResourceTypeId)> {
        let entry = &self.entries[id.0];
        entry
            .resource_type
            .relationships
            .iter()
            .zip(entry.relationship_targets.iter().copied())
    }

    /// Links of a type paired with their resolved targets
    pub fn links(&self, id: ResourceTypeId) -> impl Iterator<Item = (&Relationship, ResourceTypeId)> {
        let entry = &self.entries[id.0];
        entry
            .resource_type
            .links
            .iter()
            .zip(entry.link_targets.iter().copied())
    }

    /// Build a resource of the named type
    pub fn instantiate(
        self: &Arc<Self>,
        name: &str,
        properties: Properties,
    ) -> Result<Resource, RestGraphError> {
        let id = self.resolve(name)?;
        Ok(Resource::new(Arc::clone(self), id, properties))
    }
}
