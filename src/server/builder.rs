//! ServerBuilder for fluent API to build HTTP servers

use super::dispatcher::Dispatcher;
use super::exposure::RestExposure;
use crate::adapters::Adapter;
use crate::config::{RestGraphConfig, ServerConfig};
use crate::core::error::ConfigError;
use crate::core::manager::Manager;
use crate::core::registry::RegistryBuilder;
use crate::core::resource_type::ResourceTypeBuilder;
use anyhow::Result;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for creating HTTP servers from resource type declarations
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .declare(ResourceType::builder("Person").primary_keys(["id"]).manager(people).crud(CrudOperation::ALL))?
///     .with_standard_adapters()
///     .build()?;
/// ```
pub struct ServerBuilder {
    registry: RegistryBuilder,
    adapters: Vec<Arc<dyn Adapter>>,
    config: ServerConfig,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            registry: RegistryBuilder::new(),
            adapters: Vec::new(),
            config: ServerConfig::default(),
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare a resource type
    pub fn declare(mut self, resource_type: ResourceTypeBuilder) -> Result<Self, ConfigError> {
        self.registry.declare(resource_type)?;
        Ok(self)
    }

    /// Take server settings and resource declarations from a config file
    pub fn declare_from_config(
        mut self,
        config: &RestGraphConfig,
        managers: &HashMap<String, Arc<dyn Manager>>,
    ) -> Result<Self, ConfigError> {
        self.registry.declare_from_config(config, managers)?;
        self.config = config.server.clone();
        Ok(self)
    }

    /// Register an adapter; the first one registered is the default
    /// unless the config names another
    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// SIREN, HAL, JSON-API and plain JSON
    pub fn with_standard_adapters(mut self) -> Self {
        use crate::adapters::{HalAdapter, JsonAdapter, JsonApiAdapter, SirenAdapter};
        self.adapters.push(Arc::new(SirenAdapter));
        self.adapters.push(Arc::new(HalAdapter));
        self.adapters.push(Arc::new(JsonApiAdapter));
        self.adapters.push(Arc::new(JsonAdapter));
        self
    }

    /// Add routes that don't fit the resource model (auth callbacks, webhooks)
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Freeze the registry and build the transport-agnostic dispatcher
    ///
    /// Any configuration error aborts here; nothing is served half-built.
    pub fn build_dispatcher(self) -> Result<Dispatcher, ConfigError> {
        let registry = self.registry.freeze()?;
        Dispatcher::builder(registry)
            .adapters(self.adapters)
            .config(self.config)
            .build()
    }

    /// Build the final REST router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let dispatcher = Arc::new(self.build_dispatcher()?);
        Ok(RestExposure::build_router(dispatcher, custom_routes))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    ///
    /// # Example
    ///
    /// ```ignore
    /// ServerBuilder::new()
    ///     .declare(person)?
    ///     .with_standard_adapters()
    ///     .serve("127.0.0.1:3000").await?;
    /// ```
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
