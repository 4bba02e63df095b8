//! Wire formats
//!
//! An [`Adapter`] turns a [`Resource`] and its expanded relationship tree
//! into one hypermedia document. Adapters are pure: they never touch a
//! manager and never see the request.

pub mod hal;
pub mod json;
pub mod jsonapi;
pub mod siren;

pub use hal::HalAdapter;
pub use json::JsonAdapter;
pub use jsonapi::JsonApiAdapter;
pub use siren::SirenAdapter;

use crate::core::error::{ErrorDetail, RelationshipError, RestGraphError};
use crate::core::relationship::{Related, RelatedResource};
use crate::core::resource::Resource;
use axum::http::StatusCode;
use serde_json::Value;

/// A rendered response body
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Renders resources and errors in one hypermedia format
pub trait Adapter: Send + Sync {
    /// Content types this adapter answers to; the first one is sent back
    fn formats(&self) -> &'static [&'static str];

    fn content_type(&self) -> &'static str {
        self.formats().first().copied().unwrap_or("application/json")
    }

    /// Build the document for a resource
    fn document(&self, resource: &Resource, base_url: &str) -> Result<Value, RelationshipError>;

    /// Build the error document; it always carries the status and a message
    fn error_document(&self, detail: &ErrorDetail) -> Value;

    /// Render a resource; a 204 is an empty body in every format
    fn render(&self, resource: &Resource, base_url: &str) -> Result<Rendered, RestGraphError> {
        let body = if resource.is_empty_body() {
            Vec::new()
        } else {
            let document = self.document(resource, base_url)?;
            serde_json::to_vec(&document).map_err(|e| RestGraphError::Internal(e.to_string()))?
        };
        Ok(Rendered {
            status: resource.status(),
            content_type: self.content_type(),
            body,
        })
    }

    fn render_error(&self, error: &RestGraphError) -> Rendered {
        self.render_detail(&error.to_detail())
    }

    fn render_detail(&self, detail: &ErrorDetail) -> Rendered {
        Rendered {
            status: detail.status_code(),
            content_type: self.content_type(),
            body: self.error_document(detail).to_string().into_bytes(),
        }
    }
}

/// Media types of an `Accept` header, best first
///
/// Parameters other than `q` are ignored, `q=0` entries are dropped and
/// entries of equal weight keep their header order.
pub fn parse_accept(header: &str) -> Vec<String> {
    let mut entries: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let media_type = parts.next()?.trim().to_ascii_lowercase();
            if media_type.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|param| {
                    let (key, value) = param.split_once('=')?;
                    (key.trim() == "q").then(|| value.trim().parse::<f32>().ok())?
                })
                .next()
                .unwrap_or(1.0);
            (quality > 0.0).then_some((media_type, quality))
        })
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.into_iter().map(|(media_type, _)| media_type).collect()
}

/// Render every child of a relationship with `render`
pub(crate) fn map_related<F>(related: &RelatedResource, mut render: F) -> Result<Value, RelationshipError>
where
    F: FnMut(&Resource) -> Result<Value, RelationshipError>,
{
    Ok(match &related.related {
        Related::One(child) => render(child)?,
        Related::Many(children) => Value::Array(
            children
                .iter()
                .map(&mut render)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A small registry shared by the adapter tests

    use crate::core::Properties;
    use crate::core::endpoint::{EndpointContext, EndpointDescriptor, EndpointHandler};
    use crate::core::registry::{RegistryBuilder, ResourceRegistry};
    use crate::core::relationship::Relationship;
    use crate::core::request::RequestContainer;
    use crate::core::resource::Resource;
    use crate::core::resource_type::ResourceType;
    use async_trait::async_trait;
    use axum::http::Method;
    use serde_json::{Value, json};
    use std::sync::Arc;

    pub const BASE_URL: &str = "http://api.test";

    struct Noop;

    #[async_trait]
    impl EndpointHandler for Noop {
        async fn handle(
            &self,
            ctx: &EndpointContext,
            request: RequestContainer,
        ) -> crate::core::Result<Resource> {
            Ok(ctx.resource(request.url_params))
        }
    }

    pub fn registry() -> Arc<ResourceRegistry> {
        let mut builder = RegistryBuilder::new();
        builder
            .declare(
                ResourceType::builder("Post")
                    .primary_keys(["id"])
                    .relationship(Relationship::one("author", "User").embedded())
                    .relationship(Relationship::one("editor", "User").map_property("editor_id", "id"))
                    .link(Relationship::one("related", "Post"))
                    .custom_endpoint(
                        EndpointDescriptor::custom("publish", "publish", Noop).methods([Method::POST]),
                    )
                    .custom_endpoint(EndpointDescriptor::custom("feed", "feed", Noop).no_pks()),
            )
            .unwrap();
        builder
            .declare(ResourceType::builder("User").primary_keys(["id"]))
            .unwrap();
        builder.freeze().unwrap()
    }

    pub fn post(registry: &Arc<ResourceRegistry>) -> Resource {
        let properties: Properties = json!({
            "id": 1,
            "title": "Hello",
            "_version": 3,
            "author": {"id": 7, "name": "Ann"},
            "editor_id": 8,
        })
        .as_object()
        .cloned()
        .unwrap();
        let mut links = Properties::new();
        links.insert("related".to_string(), json!({"id": 2}));
        registry
            .instantiate("Post", properties)
            .unwrap()
            .with_meta_links(links)
    }

    pub fn parse(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::NotFoundError;
    use crate::core::Properties;

    fn adapters() -> Vec<Box<dyn Adapter>> {
        vec![
            Box::new(JsonAdapter),
            Box::new(HalAdapter),
            Box::new(SirenAdapter),
            Box::new(JsonApiAdapter),
        ]
    }

    #[test]
    fn test_parse_accept_orders_by_quality() {
        assert_eq!(
            parse_accept("text/html;q=0.5, application/hal+json, application/vnd.siren+json;q=0.9"),
            vec!["application/hal+json", "application/vnd.siren+json", "text/html"]
        );
    }

    #[test]
    fn test_parse_accept_is_stable_and_drops_q_zero() {
        assert_eq!(
            parse_accept("application/json; charset=utf-8, application/hal+json, text/plain;q=0"),
            vec!["application/json", "application/hal+json"]
        );
        assert!(parse_accept("").is_empty());
    }

    #[test]
    fn test_not_found_renders_404_everywhere() {
        let error = RestGraphError::from(NotFoundError::new("Person", &Properties::new()));
        for adapter in adapters() {
            let rendered = adapter.render_error(&error);
            assert_eq!(rendered.status, StatusCode::NOT_FOUND);
            assert_eq!(rendered.content_type, adapter.content_type());
            let body = fixtures::parse(&rendered.body);
            let message = match adapter.content_type() {
                siren::CONTENT_TYPE => &body["properties"]["message"],
                jsonapi::CONTENT_TYPE => &body["errors"][0]["message"],
                _ => &body["message"],
            };
            let message = message.as_str().unwrap_or_default();
            assert!(!message.is_empty(), "no message in {}", body);
            assert!(message.contains("not found"), "{}", message);
        }
    }

    #[test]
    fn test_no_content_is_empty_in_every_format() {
        let registry = fixtures::registry();
        for adapter in adapters() {
            let resource = fixtures::post(&registry).with_status(StatusCode::NO_CONTENT);
            let rendered = adapter.render(&resource, fixtures::BASE_URL).unwrap();
            assert_eq!(rendered.status, StatusCode::NO_CONTENT);
            assert!(rendered.body.is_empty());
        }
    }

    #[test]
    fn test_private_keys_never_rendered() {
        let registry = fixtures::registry();
        for adapter in adapters() {
            let rendered = adapter.render(&fixtures::post(&registry), fixtures::BASE_URL).unwrap();
            let body = String::from_utf8(rendered.body).unwrap();
            assert!(!body.contains("_version"), "{}", body);
        }
    }
}
