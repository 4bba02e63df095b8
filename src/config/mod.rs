//! Configuration loading and management

use crate::core::endpoint::CrudOperation;
use crate::core::error::ConfigError;
use crate::core::manager::Manager;
use crate::core::relationship::Relationship;
use crate::core::resource_type::{ResourceType, ResourceTypeBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

/// Server-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Prefix of every emitted url (e.g. "https://api.example.com")
    #[serde(default)]
    pub base_url: String,

    /// Content type of the fallback adapter; the first registered adapter if unset
    #[serde(default)]
    pub default_format: Option<String>,

    /// Page size when neither the request nor the manager sets one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for the `count` query parameter
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_format: None,
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// A relationship or link declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,

    /// Name of the target resource type
    pub target: String,

    #[serde(default)]
    pub many: bool,

    #[serde(default)]
    pub embedded: bool,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub no_pks: bool,

    /// Parent property -> child property
    #[serde(default)]
    pub property_map: IndexMap<String, String>,

    #[serde(default)]
    pub query_args: Vec<String>,
}

impl RelationshipConfig {
    pub fn to_relationship(&self) -> Relationship {
        let mut relationship = if self.many {
            Relationship::many(&self.name, &self.target)
        } else {
            Relationship::one(&self.name, &self.target)
        };
        if self.embedded {
            relationship = relationship.embedded();
        }
        if self.required {
            relationship = relationship.required();
        }
        if self.no_pks {
            relationship = relationship.no_pks();
        }
        for (parent, child) in &self.property_map {
            relationship = relationship.map_property(parent, child);
        }
        relationship.query_args(self.query_args.iter().cloned())
    }
}

/// A resource type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    /// Path segment; derived from `name` when omitted (Person -> people)
    #[serde(default)]
    pub resource_name: Option<String>,

    #[serde(default)]
    pub primary_keys: Vec<String>,

    /// Key into the manager map handed to the registry
    #[serde(default)]
    pub manager: Option<String>,

    #[serde(default)]
    pub endpoints: Vec<CrudOperation>,

    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,

    #[serde(default)]
    pub links: Vec<RelationshipConfig>,

    #[serde(default)]
    pub public_fields: Option<Vec<String>>,
}

impl ResourceConfig {
    /// Turn the declaration into a builder, binding its manager
    pub fn to_builder(
        &self,
        managers: &HashMap<String, Arc<dyn Manager>>,
    ) -> Result<ResourceTypeBuilder, ConfigError> {
        let mut builder = ResourceType::builder(&self.name)
            .namespace(&self.namespace)
            .primary_keys(self.primary_keys.iter().cloned())
            .crud(self.endpoints.iter().copied());

        if let Some(resource_name) = &self.resource_name {
            builder = builder.resource_name(resource_name);
        }
        if let Some(key) = &self.manager {
            let manager = managers.get(key).ok_or_else(|| ConfigError::UnknownManager {
                key: key.clone(),
                resource: self.name.clone(),
            })?;
            builder = builder.manager(Arc::clone(manager));
        }
        if let Some(fields) = &self.public_fields {
            builder = builder.public_fields(fields.iter().cloned());
        }
        for relationship in &self.relationships {
            builder = builder.relationship(relationship.to_relationship());
        }
        for link in &self.links {
            builder = builder.link(link.to_relationship());
        }
        Ok(builder)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestGraphConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl RestGraphConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = Some(path.display().to_string());
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            file: file.clone(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            file,
            message: e.to_string(),
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            file: None,
            message: e.to_string(),
        })
    }
}
