//! HAL: `{_links: {self, ...}, _embedded: {...}, ...properties}`

use super::{Adapter, map_related};
use crate::core::Properties;
use crate::core::error::{ErrorDetail, RelationshipError};
use crate::core::resource::Resource;
use serde_json::{Value, json};

pub const CONTENT_TYPE: &str = "application/hal+json";

#[derive(Debug, Clone, Copy, Default)]
pub struct HalAdapter;

fn href(resource: &Resource, base_url: &str) -> Value {
    json!({ "href": resource.url(base_url) })
}

fn hal(resource: &Resource, base_url: &str) -> Result<Value, RelationshipError> {
    let mut links = Properties::new();
    links.insert("self".to_string(), href(resource, base_url));
    for linked in resource.linked_resources()? {
        links.insert(
            linked.name.clone(),
            map_related(linked, |child| Ok(href(child, base_url)))?,
        );
    }

    let mut embedded = Properties::new();
    for related in resource.related_resources()? {
        if related.embedded {
            embedded.insert(
                related.name.clone(),
                map_related(related, |child| hal(child, base_url))?,
            );
        } else {
            links.insert(
                related.name.clone(),
                map_related(related, |child| Ok(href(child, base_url)))?,
            );
        }
    }

    let mut document = Properties::new();
    document.insert("_links".to_string(), Value::Object(links));
    if !embedded.is_empty() {
        document.insert("_embedded".to_string(), Value::Object(embedded));
    }
    document.extend(resource.public_properties()?);
    Ok(Value::Object(document))
}

impl Adapter for HalAdapter {
    fn formats(&self) -> &'static [&'static str] {
        &[CONTENT_TYPE]
    }

    fn document(&self, resource: &Resource, base_url: &str) -> Result<Value, RelationshipError> {
        hal(resource, base_url)
    }

    fn error_document(&self, detail: &ErrorDetail) -> Value {
        json!(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fixtures;

    #[test]
    fn test_embedded_and_linked_relationships() {
        let registry = fixtures::registry();
        let document = HalAdapter
            .document(&fixtures::post(&registry), fixtures::BASE_URL)
            .unwrap();
        assert_eq!(
            document,
            json!({
                "_links": {
                    "self": {"href": "http://api.test/posts/1"},
                    "related": {"href": "http://api.test/posts/2"},
                    "editor": {"href": "http://api.test/users/8"},
                },
                "_embedded": {
                    "author": {
                        "_links": {"self": {"href": "http://api.test/users/7"}},
                        "id": 7,
                        "name": "Ann",
                    }
                },
                "id": 1,
                "title": "Hello",
            })
        );
    }

    #[test]
    fn test_no_embedded_key_without_embedded_children() {
        let registry = fixtures::registry();
        let post = registry
            .instantiate("Post", json!({"id": 4}).as_object().cloned().unwrap())
            .unwrap();
        let document = HalAdapter.document(&post, "").unwrap();
        assert!(document.get("_embedded").is_none());
        assert_eq!(document["_links"]["self"]["href"], json!("/posts/4"));
    }
}
