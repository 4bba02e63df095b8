//! REST exposure over axum
//!
//! Every request that is not a health check is forwarded to the
//! dispatcher, which matches it against the route table itself. That keeps
//! 404/405 answers in the negotiated hypermedia format instead of axum's
//! plain-text defaults.

use crate::adapters::{Rendered, parse_accept};
use crate::core::request::QueryArgs;
use crate::server::dispatcher::Dispatcher;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Query parameter naming a content type that wins over `Accept`
pub const FORMAT_PARAM: &str = "format";

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the axum router for a dispatcher
    ///
    /// The dispatcher only sees requests no other route matched, so
    /// `custom_routes` take precedence over resource routes.
    pub fn build_router(dispatcher: Arc<Dispatcher>, custom_routes: Vec<Router>) -> Router {
        let mut app: Router = Self::health_routes().fallback(handle).with_state(dispatcher);
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }
        app.layer(TraceLayer::new_for_http())
    }

    fn health_routes() -> Router<Arc<Dispatcher>> {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "restgraph"
        }))
    }
}

/// Accepted media types: the `format` query param first, then `Accept`
pub fn accepted_formats(query: &str, headers: &HeaderMap) -> Vec<String> {
    let mut accepted = Vec::new();
    if let Some(format) = QueryArgs::parse(query).first(FORMAT_PARAM) {
        // an unescaped `+` arrives as a space
        accepted.push(format.trim().replace(' ', "+").to_ascii_lowercase());
    }
    if let Some(accept) = headers.get(ACCEPT).and_then(|v| v.to_str().ok()) {
        accepted.extend(parse_accept(accept));
    }
    accepted
}

async fn handle(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query = uri.query().unwrap_or_default();
    let accepted = accepted_formats(query, &headers);
    dispatcher
        .handle(&method, uri.path(), query, &accepted, &body)
        .await
        .into_response()
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        let has_body = !self.body.is_empty();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if has_body {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        }
        response
    }
}
