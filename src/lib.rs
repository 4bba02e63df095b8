//! # restgraph
//!
//! A hypermedia REST framework: declare resource types, bind them to
//! persistence managers, and serve their CRUD endpoints as SIREN, HAL,
//! JSON-API or plain JSON documents.
//!
//! ## Features
//!
//! - **Two-phase registry**: resource types reference each other by name and
//!   are resolved in one validation pass at startup
//! - **Relationship expansion**: nested property trees become embedded or
//!   linked sub-resources, lazily and exactly as deep as the data goes
//! - **Keyset pagination**: `next`/`previous` links built from primary keys
//! - **Content negotiation**: `Accept` header or `format` query parameter
//! - **Configuration-Based**: declare resources in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restgraph::prelude::*;
//!
//! let people = Arc::new(InMemoryManager::new(
//!     "Person",
//!     vec![Field::integer("id"), Field::string("first_name").required()],
//!     ["id"],
//! ));
//!
//! ServerBuilder::new()
//!     .declare(
//!         ResourceType::builder("Person")
//!             .primary_keys(["id"])
//!             .manager(people)
//!             .crud(CrudOperation::ALL),
//!     )?
//!     .with_standard_adapters()
//!     .serve("127.0.0.1:3000")
//!     .await?;
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Cardinality, CrudOperation, Cursor, EndpointContext, EndpointDescriptor, EndpointHandler,
        Field, FieldKind, ListPage, Manager, ManagerError, PageRequest, Properties, RegistryBuilder,
        Related, Relationship, RequestContainer, Resource, ResourceRegistry, ResourceType,
        ResourceTypeBuilder, RestGraphError,
    };

    // === Adapters ===
    pub use crate::adapters::{
        Adapter, HalAdapter, JsonAdapter, JsonApiAdapter, Rendered, SirenAdapter,
    };

    // === Storage ===
    pub use crate::storage::InMemoryManager;

    // === Config ===
    pub use crate::config::{RelationshipConfig, ResourceConfig, RestGraphConfig, ServerConfig};

    // === Server ===
    pub use crate::server::{Dispatcher, RestExposure, ServerBuilder};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
