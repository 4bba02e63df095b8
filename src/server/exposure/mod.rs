//! API exposure modules
//!
//! An exposure consumes a [`Dispatcher`](super::Dispatcher) and produces a
//! router for one transport. Only HTTP through axum is provided.

pub mod rest;

pub use rest::RestExposure;
