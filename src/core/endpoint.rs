//! Endpoint descriptors and the built-in CRUD operations

use crate::core::Properties;
use crate::core::error::{RestGraphError, Result, TranslationError};
use crate::core::field::{Field, FieldSummary, translate_fields};
use crate::core::manager::{Manager, PageRequest};
use crate::core::pagination::{COUNT, PAGINATION_PK, param_value};
use crate::core::registry::{ResourceRegistry, ResourceTypeId};
use crate::core::request::RequestContainer;
use crate::core::resource::Resource;
use crate::core::resource_type::ResourceType;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The five operations every manager-backed type may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrudOperation {
    Create,
    Retrieve,
    RetrieveList,
    Update,
    Delete,
}

impl CrudOperation {
    pub const ALL: [CrudOperation; 5] = [
        CrudOperation::Create,
        CrudOperation::Retrieve,
        CrudOperation::RetrieveList,
        CrudOperation::Update,
        CrudOperation::Delete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CrudOperation::Create => "create",
            CrudOperation::Retrieve => "retrieve",
            CrudOperation::RetrieveList => "retrieve_list",
            CrudOperation::Update => "update",
            CrudOperation::Delete => "delete",
        }
    }

    pub fn method(self) -> Method {
        match self {
            CrudOperation::Create => Method::POST,
            CrudOperation::Retrieve | CrudOperation::RetrieveList => Method::GET,
            CrudOperation::Update => Method::PATCH,
            CrudOperation::Delete => Method::DELETE,
        }
    }

    /// Collection operations are routed without primary key placeholders
    pub fn is_collection(self) -> bool {
        matches!(self, CrudOperation::Create | CrudOperation::RetrieveList)
    }

    /// Fields advertised for this operation
    pub(crate) fn fields(self, manager: &dyn Manager) -> Vec<Field> {
        match self {
            CrudOperation::Create => manager.create_fields().to_vec(),
            CrudOperation::RetrieveList => manager.list_fields().to_vec(),
            CrudOperation::Update => manager.update_fields().to_vec(),
            CrudOperation::Retrieve | CrudOperation::Delete => Vec::new(),
        }
    }

    pub(crate) async fn execute(
        self,
        ctx: &EndpointContext,
        request: RequestContainer,
    ) -> Result<Resource> {
        let resource_type = ctx.resource_type();
        let manager = resource_type.manager.clone().ok_or_else(|| {
            RestGraphError::Internal(format!("{} has no manager", resource_type.name))
        })?;

        match self {
            CrudOperation::Create => {
                let values = translate_fields(manager.create_fields(), &request.body, false)?;
                let created = manager.create(values).await?;
                Ok(ctx.resource(created).with_status(StatusCode::CREATED))
            }
            CrudOperation::Retrieve => {
                let lookup = ctx.lookup(&request)?;
                let found = manager.retrieve(&lookup).await?;
                Ok(ctx.resource(found))
            }
            CrudOperation::RetrieveList => retrieve_list(ctx, manager.as_ref(), &request).await,
            CrudOperation::Update => {
                let lookup = ctx.lookup(&request)?;
                let updates = translate_fields(manager.update_fields(), &request.body, true)?;
                let updated = manager.update(&lookup, updates).await?;
                Ok(ctx.resource(updated))
            }
            CrudOperation::Delete => {
                let lookup = ctx.lookup(&request)?;
                manager.delete(&lookup).await?;
                Ok(ctx.resource(lookup).with_status(StatusCode::NO_CONTENT))
            }
        }
    }
}

async fn retrieve_list(
    ctx: &EndpointContext,
    manager: &dyn Manager,
    request: &RequestContainer,
) -> Result<Resource> {
    let resource_type = ctx.resource_type();
    let raw_filters = request.query_args.to_properties(manager.list_fields());
    let filters = translate_fields(manager.list_fields(), &raw_filters, true)?;

    let page_size = match request.query_args.first(COUNT) {
        Some(count) => count.parse::<usize>().map_err(|_| TranslationError {
            field: COUNT.to_string(),
            expected: "integer",
            value: count.to_string(),
        })?,
        None => manager.paginate_by().unwrap_or(ctx.default_page_size),
    };
    let page = PageRequest {
        after: page_token(resource_type, request)?,
        page_size: page_size.clamp(1, ctx.max_page_size.max(1)),
    };

    let listed = manager.retrieve_list(&filters, &page).await?;
    tracing::debug!(
        resource = %resource_type.name,
        items = listed.items.len(),
        has_next = listed.next.is_some(),
        "listed page"
    );

    // Cursors always carry the filters of the request that produced them.
    let active: BTreeMap<String, Vec<String>> = raw_filters
        .iter()
        .map(|(k, v)| match v {
            Value::Array(values) => (k.clone(), values.iter().map(param_value).collect()),
            other => (k.clone(), vec![param_value(other)]),
        })
        .collect();

    let mut links = Properties::new();
    if let Some(next) = listed.next {
        links.insert("next".to_string(), next.with_filters(active.clone()).to_link_properties().into());
    }
    if let Some(previous) = listed.previous {
        links.insert("previous".to_string(), previous.with_filters(active).to_link_properties().into());
    }

    let mut properties = Properties::new();
    properties.insert(
        resource_type.resource_name.clone(),
        Value::Array(listed.items.into_iter().map(Value::Object).collect()),
    );
    Ok(ctx.resource(properties).without_pks().with_meta_links(links))
}

/// The `pagination_pk` tuple of a list request
///
/// No token, or only empty ones, means the first page. Anything else must
/// hold one value per primary key, each valid for that key's field.
fn page_token(resource_type: &ResourceType, request: &RequestContainer) -> Result<Vec<String>> {
    let tokens: Vec<String> = request
        .query_args
        .all(PAGINATION_PK)
        .into_iter()
        .map(str::to_string)
        .collect();
    if tokens.iter().all(String::is_empty) {
        return Ok(Vec::new());
    }

    let invalid = || TranslationError {
        field: PAGINATION_PK.to_string(),
        expected: "primary key",
        value: tokens.join(","),
    };
    let pk_fields = resource_type.pk_fields();
    if tokens.len() != pk_fields.len() {
        return Err(invalid().into());
    }
    for (field, token) in pk_fields.iter().zip(&tokens) {
        field
            .translate(&Value::String(token.clone()))
            .map_err(|_| invalid())?;
    }
    Ok(tokens)
}

/// A user-defined endpoint
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    async fn handle(&self, ctx: &EndpointContext, request: RequestContainer) -> Result<Resource>;
}

/// What runs when an endpoint is hit
#[derive(Clone)]
pub enum EndpointAction {
    Crud(CrudOperation),
    Custom(Arc<dyn EndpointHandler>),
}

impl fmt::Debug for EndpointAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointAction::Crud(op) => f.debug_tuple("Crud").field(op).finish(),
            EndpointAction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One entry of a resource type's endpoint dictionary
///
/// `route` is relative to the type's base url: the item url for endpoints
/// that need primary keys, the collection url for `no_pks` endpoints.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub name: String,
    pub route: String,
    pub methods: Vec<Method>,
    pub no_pks: bool,
    pub fields: Vec<Field>,
    pub action: EndpointAction,
}

impl EndpointDescriptor {
    pub(crate) fn crud(op: CrudOperation) -> Self {
        Self {
            name: op.name().to_string(),
            route: String::new(),
            methods: vec![op.method()],
            no_pks: op.is_collection(),
            fields: Vec::new(),
            action: EndpointAction::Crud(op),
        }
    }

    /// A custom endpoint answering GET on `route`
    pub fn custom(
        name: impl Into<String>,
        route: impl Into<String>,
        handler: impl EndpointHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            route: route.into(),
            methods: vec![Method::GET],
            no_pks: false,
            fields: Vec::new(),
            action: EndpointAction::Custom(Arc::new(handler)),
        }
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn no_pks(mut self) -> Self {
        self.no_pks = true;
        self
    }

    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn crud_operation(&self) -> Option<CrudOperation> {
        match self.action {
            EndpointAction::Crud(op) => Some(op),
            EndpointAction::Custom(_) => None,
        }
    }

    pub fn field_summaries(&self) -> Vec<FieldSummary> {
        self.fields.iter().map(FieldSummary::from).collect()
    }

    pub(crate) async fn execute(
        &self,
        ctx: &EndpointContext,
        request: RequestContainer,
    ) -> Result<Resource> {
        match &self.action {
            EndpointAction::Crud(op) => op.execute(ctx, request).await,
            EndpointAction::Custom(handler) => handler.handle(ctx, request).await,
        }
    }
}

/// What an endpoint sees of the application besides its request
#[derive(Debug, Clone)]
pub struct EndpointContext {
    pub registry: Arc<ResourceRegistry>,
    pub type_id: ResourceTypeId,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl EndpointContext {
    pub fn resource_type(&self) -> &ResourceType {
        self.registry.get(self.type_id)
    }

    /// A resource of the endpoint's own type
    pub fn resource(&self, properties: Properties) -> Resource {
        Resource::new(Arc::clone(&self.registry), self.type_id, properties)
    }

    /// A resource of another registered type
    pub fn resource_of(&self, type_name: &str, properties: Properties) -> Result<Resource> {
        self.registry.instantiate(type_name, properties)
    }

    /// Translate the url params into a primary key lookup
    pub fn lookup(&self, request: &RequestContainer) -> Result<Properties> {
        let pk_fields = self.resource_type().pk_fields();
        translate_fields(&pk_fields, &request.url_params, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud_methods_and_scope() {
        assert_eq!(CrudOperation::Create.method(), Method::POST);
        assert_eq!(CrudOperation::Update.method(), Method::PATCH);
        assert!(CrudOperation::RetrieveList.is_collection());
        assert!(!CrudOperation::Delete.is_collection());
        assert_eq!(CrudOperation::RetrieveList.name(), "retrieve_list");
    }

    #[test]
    fn test_crud_descriptor_defaults() {
        let descriptor = EndpointDescriptor::crud(CrudOperation::Retrieve);
        assert_eq!(descriptor.name, "retrieve");
        assert_eq!(descriptor.methods, vec![Method::GET]);
        assert!(!descriptor.no_pks);
        assert_eq!(descriptor.crud_operation(), Some(CrudOperation::Retrieve));
    }

    #[test]
    fn test_operations_deserialize_snake_case() {
        let ops: Vec<CrudOperation> =
            serde_yaml::from_str("[create, retrieve_list, delete]").unwrap();
        assert_eq!(
            ops,
            vec![
                CrudOperation::Create,
                CrudOperation::RetrieveList,
                CrudOperation::Delete
            ]
        );
    }
}
