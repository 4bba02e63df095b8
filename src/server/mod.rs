//! Server module for serving resource types over HTTP
//!
//! This module provides:
//! - a transport-agnostic [`Dispatcher`] (negotiation, execution, rendering)
//! - the axum exposure in [`exposure`]
//! - a [`ServerBuilder`] tying declarations, adapters and config together

pub mod builder;
pub mod dispatcher;
pub mod exposure;

pub use builder::ServerBuilder;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use exposure::RestExposure;
