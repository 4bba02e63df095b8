//! Core module containing the resource model of the framework

pub mod endpoint;
pub mod error;
pub mod field;
pub mod manager;
pub mod naming;
pub mod pagination;
pub mod registry;
pub mod relationship;
pub mod request;
pub mod resource;
pub mod resource_type;
pub mod routes;

/// Ordered property map shared by resources, requests and managers
pub type Properties = serde_json::Map<String, serde_json::Value>;

pub use endpoint::{CrudOperation, EndpointAction, EndpointContext, EndpointDescriptor, EndpointHandler};
pub use error::{ErrorDetail, RestGraphError, Result};
pub use field::{Field, FieldKind, FieldSummary};
pub use manager::{ListPage, Manager, ManagerError, PageRequest};
pub use pagination::Cursor;
pub use registry::{RegistryBuilder, ResourceRegistry, ResourceTypeId};
pub use relationship::{Cardinality, Related, RelatedResource, Relationship};
pub use request::{QueryArgs, RequestContainer};
pub use resource::{Meta, Resource, ResourceAction};
pub use resource_type::{ResourceType, ResourceTypeBuilder};
pub use routes::{Route, RouteTable};
