//! JSON-API: `{data: {id, type, attributes, relationships, links}, included, links}`

use super::{Adapter, map_related};
use crate::core::Properties;
use crate::core::error::{ErrorDetail, RelationshipError};
use crate::core::relationship::Related;
use crate::core::resource::Resource;
use serde_json::{Value, json};
use std::collections::HashSet;

pub const CONTENT_TYPE: &str = "application/vnd.api+json";

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonApiAdapter;

fn identifier(resource: &Resource) -> Value {
    json!({
        "id": resource.id_string(),
        "type": resource.resource_type().resource_name,
    })
}

/// Full resource object; embedded children are pushed onto `included`
fn resource_object(
    resource: &Resource,
    base_url: &str,
    included: &mut Vec<Value>,
    seen: &mut HashSet<(String, String)>,
) -> Result<Value, RelationshipError> {
    let mut relationships = Properties::new();
    for related in resource.related_resources()? {
        let data = match &related.related {
            Related::One(child) => identifier(child),
            Related::Many(children) => Value::Array(children.iter().map(identifier).collect()),
        };
        relationships.insert(related.name.clone(), json!({ "data": data }));

        if related.embedded {
            for child in related.related.iter() {
                let key = (child.resource_type().resource_name.clone(), child.id_string());
                if seen.insert(key) {
                    let object = resource_object(child, base_url, included, seen)?;
                    included.push(object);
                }
            }
        }
    }

    let mut object = Properties::new();
    object.insert("id".to_string(), Value::String(resource.id_string()));
    object.insert(
        "type".to_string(),
        Value::String(resource.resource_type().resource_name.clone()),
    );
    object.insert("attributes".to_string(), Value::Object(resource.public_properties()?));
    if !relationships.is_empty() {
        object.insert("relationships".to_string(), Value::Object(relationships));
    }
    object.insert("links".to_string(), json!({ "self": resource.url(base_url) }));
    Ok(Value::Object(object))
}

impl Adapter for JsonApiAdapter {
    fn formats(&self) -> &'static [&'static str] {
        &[CONTENT_TYPE]
    }

    fn document(&self, resource: &Resource, base_url: &str) -> Result<Value, RelationshipError> {
        let mut included = Vec::new();
        let mut seen = HashSet::new();
        let data = resource_object(resource, base_url, &mut included, &mut seen)?;

        let mut links = Properties::new();
        links.insert("self".to_string(), Value::String(resource.url(base_url)));
        // many-links render as an array of urls
        for linked in resource.linked_resources()? {
            let url = map_related(&linked, |child| Ok(Value::String(child.url(base_url))))?;
            links.insert(linked.name.clone(), url);
        }

        let mut document = Properties::new();
        document.insert("data".to_string(), data);
        if !included.is_empty() {
            document.insert("included".to_string(), Value::Array(included));
        }
        document.insert("links".to_string(), Value::Object(links));
        if !resource.meta().extra.is_empty() {
            document.insert("meta".to_string(), Value::Object(resource.meta().extra.clone()));
        }
        if !resource.errors().is_empty() {
            let errors = resource.errors().iter().map(|e| self.error_object(e)).collect();
            document.insert("errors".to_string(), Value::Array(errors));
        }
        Ok(Value::Object(document))
    }

    fn error_document(&self, detail: &ErrorDetail) -> Value {
        json!({ "errors": [self.error_object(detail)] })
    }
}

impl JsonApiAdapter {
    fn error_object(&self, detail: &ErrorDetail) -> Value {
        let mut object = json!({
            "status": detail.status.to_string(),
            "code": detail.code,
            "title": detail.status_code().canonical_reason().unwrap_or("Error"),
            "detail": detail.message,
            "message": detail.message,
        });
        if let Some(details) = &detail.details {
            object["meta"] = details.clone();
        }
        object
    }
}
