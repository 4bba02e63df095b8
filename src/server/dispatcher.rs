//! Request dispatcher
//!
//! Binds the route table, the endpoints and the adapters together. Every
//! request goes through the same states:
//!
//! ```text
//! Received -> Matched -> Authorized -> FieldsTranslated -> HandlerExecuted -> Rendered
//! ```
//!
//! Any failure jumps straight to rendering an error document with the
//! adapter negotiated when the request was received. Authorization is
//! left to the host and passes through.

use crate::adapters::{Adapter, HalAdapter, JsonAdapter, JsonApiAdapter, Rendered, SirenAdapter};
use crate::config::ServerConfig;
use crate::core::endpoint::EndpointContext;
use crate::core::error::{ConfigError, RequestError, RestGraphError, Result};
use crate::core::registry::ResourceRegistry;
use crate::core::request::{QueryArgs, RequestContainer};
use crate::core::resource::Resource;
use crate::core::routes::{Route, RouteTable};
use axum::http::Method;
use std::collections::HashMap;
use std::sync::Arc;

const ANY: &str = "*/*";

/// Collects adapters and settings for a [`Dispatcher`]
pub struct DispatcherBuilder {
    registry: Arc<ResourceRegistry>,
    adapters: Vec<Arc<dyn Adapter>>,
    config: ServerConfig,
}

impl DispatcherBuilder {
    /// Register an adapter; the first one registered is the default
    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn Adapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    /// SIREN, HAL, JSON-API and plain JSON, in that order
    pub fn standard_adapters(self) -> Self {
        self.adapter(SirenAdapter)
            .adapter(HalAdapter)
            .adapter(JsonApiAdapter)
            .adapter(JsonAdapter)
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the fallback adapter by content type
    pub fn default_format(mut self, content_type: impl Into<String>) -> Self {
        self.config.default_format = Some(content_type.into());
        self
    }

    pub fn build(self) -> std::result::Result<Dispatcher, ConfigError> {
        let mut adapters = self.adapters;
        if adapters.is_empty() {
            adapters.push(Arc::new(JsonAdapter));
        }

        let mut by_format = HashMap::new();
        for (index, adapter) in adapters.iter().enumerate() {
            for format in adapter.formats() {
                if by_format.insert(format.to_ascii_lowercase(), index).is_some() {
                    return Err(ConfigError::AdapterFormatConflict {
                        content_type: format.to_string(),
                    });
                }
            }
        }

        let default_adapter = match &self.config.default_format {
            Some(content_type) => *by_format
                .get(&content_type.to_ascii_lowercase())
                .ok_or_else(|| ConfigError::UnknownDefaultFormat {
                    content_type: content_type.clone(),
                })?,
            None => 0,
        };

        tracing::info!(
            adapters = adapters.len(),
            default = adapters[default_adapter].content_type(),
            routes = self.registry.routes().routes().len(),
            "dispatcher ready"
        );
        Ok(Dispatcher {
            registry: self.registry,
            adapters,
            by_format,
            default_adapter,
            config: self.config,
        })
    }
}

/// Executes endpoints and renders their results
pub struct Dispatcher {
    registry: Arc<ResourceRegistry>,
    adapters: Vec<Arc<dyn Adapter>>,
    by_format: HashMap<String, usize>,
    default_adapter: usize,
    config: ServerConfig,
}

impl Dispatcher {
    pub fn builder(registry: Arc<ResourceRegistry>) -> DispatcherBuilder {
        DispatcherBuilder {
            registry,
            adapters: Vec::new(),
            config: ServerConfig::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn routes(&self) -> &RouteTable {
        self.registry.routes()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn default_adapter(&self) -> &dyn Adapter {
        self.adapters[self.default_adapter].as_ref()
    }

    /// First adapter registered for any accepted type, else the default
    pub fn negotiate(&self, accepted: &[String]) -> &dyn Adapter {
        let index = accepted
            .iter()
            .take_while(|media_type| media_type.as_str() != ANY)
            .find_map(|media_type| self.by_format.get(&media_type.to_ascii_lowercase()))
            .copied()
            .unwrap_or(self.default_adapter);
        self.adapters[index].as_ref()
    }

    /// Run the endpoint behind `route`
    pub async fn execute(&self, route: &Route, request: RequestContainer) -> Result<Resource> {
        let resource_type = self.registry.get(route.resource);
        let endpoint = resource_type.endpoints.get(&route.endpoint).ok_or_else(|| {
            RequestError::UnknownEndpoint {
                resource: resource_type.name.clone(),
                endpoint: route.endpoint.clone(),
            }
        })?;
        let ctx = EndpointContext {
            registry: Arc::clone(&self.registry),
            type_id: route.resource,
            default_page_size: self.config.default_page_size,
            max_page_size: self.config.max_page_size,
        };
        endpoint.execute(&ctx, request).await
    }

    /// Execute and render with the adapter negotiated from `accepted`
    pub async fn dispatch(
        &self,
        route: &Route,
        request: RequestContainer,
        accepted: &[String],
    ) -> Rendered {
        let adapter = self.negotiate(accepted);
        tracing::debug!(
            method = %route.method,
            route = %route.template,
            format = adapter.content_type(),
            "matched"
        );
        // Authorized: no policy of our own, the host filters before us.
        let rendered = match self.execute(route, request).await {
            Ok(resource) => {
                tracing::debug!(status = %resource.status(), "handler executed");
                adapter.render(&resource, &self.config.base_url)
            }
            Err(err) => Err(err),
        };
        match rendered {
            Ok(rendered) => rendered,
            Err(err) => self.render_failure(adapter, &err),
        }
    }

    /// Match a raw request against the route table, then dispatch it
    pub async fn handle(
        &self,
        method: &Method,
        path: &str,
        query: &str,
        accepted: &[String],
        body: &[u8],
    ) -> Rendered {
        tracing::debug!(%method, path, "received");
        let adapter = self.negotiate(accepted);
        let matched = match self.routes().match_route(method, path) {
            Ok(matched) => matched,
            // Unroutable requests never reach a resource type; use the default.
            Err(err) => return self.render_failure(self.default_adapter(), &err.into()),
        };

        let body = match RequestContainer::parse_body(body) {
            Ok(body) => body,
            Err(err) => return self.render_failure(adapter, &err.into()),
        };
        let request = RequestContainer::new(method.clone())
            .with_url_params(matched.url_params)
            .with_query(QueryArgs::parse(query))
            .with_body(body);
        self.dispatch(matched.route, request, accepted).await
    }

    fn render_failure(&self, adapter: &dyn Adapter, err: &RestGraphError) -> Rendered {
        if err.status_code().is_server_error() {
            tracing::error!(error = %err, code = err.error_code(), "request failed");
        } else {
            tracing::debug!(error = %err, code = err.error_code(), "request rejected");
        }
        adapter.render_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{hal, json, jsonapi, siren};
    use crate::core::registry::RegistryBuilder;

    fn registry() -> Arc<ResourceRegistry> {
        RegistryBuilder::new().freeze().unwrap()
    }

    fn accepted(types: &[&str]) -> Vec<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_first_registered_adapter_is_default() {
        let dispatcher = Dispatcher::builder(registry())
            .standard_adapters()
            .build()
            .unwrap();
        assert_eq!(dispatcher.default_adapter().content_type(), siren::CONTENT_TYPE);
        assert_eq!(
            dispatcher.negotiate(&accepted(&["text/html"])).content_type(),
            siren::CONTENT_TYPE
        );
    }

    #[test]
    fn test_negotiation_scans_in_order() {
        let dispatcher = Dispatcher::builder(registry())
            .standard_adapters()
            .build()
            .unwrap();
        let adapter = dispatcher.negotiate(&accepted(&[
            "text/html",
            "application/vnd.api+json",
            "application/hal+json",
        ]));
        assert_eq!(adapter.content_type(), jsonapi::CONTENT_TYPE);
        let adapter = dispatcher.negotiate(&accepted(&["APPLICATION/HAL+JSON"]));
        assert_eq!(adapter.content_type(), hal::CONTENT_TYPE);
    }

    #[test]
    fn test_wildcard_selects_default() {
        let dispatcher = Dispatcher::builder(registry())
            .standard_adapters()
            .default_format(json::CONTENT_TYPE)
            .build()
            .unwrap();
        let adapter = dispatcher.negotiate(&accepted(&["*/*", "application/hal+json"]));
        assert_eq!(adapter.content_type(), json::CONTENT_TYPE);
    }

    #[test]
    fn test_conflicting_adapters_fail() {
        let err = Dispatcher::builder(registry())
            .adapter(JsonAdapter)
            .adapter(JsonAdapter)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::AdapterFormatConflict { .. }));
    }

    #[test]
    fn test_unknown_default_format_fails() {
        let err = Dispatcher::builder(registry())
            .adapter(HalAdapter)
            .default_format("text/csv")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnknownDefaultFormat { .. }));
    }

    #[tokio::test]
    async fn test_unknown_route_renders_404_with_default_adapter() {
        let dispatcher = Dispatcher::builder(registry())
            .adapter(HalAdapter)
            .adapter(JsonAdapter)
            .build()
            .unwrap();
        let rendered = dispatcher
            .handle(&Method::GET, "/nowhere", "", &accepted(&["application/json"]), b"")
            .await;
        assert_eq!(rendered.status.as_u16(), 404);
        assert_eq!(rendered.content_type, hal::CONTENT_TYPE);
    }
}
