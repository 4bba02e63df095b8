//! Plain JSON: `{resource_name: {...properties, relationship: child(ren)}}`

use super::{Adapter, map_related};
use crate::core::Properties;
use crate::core::error::{ErrorDetail, RelationshipError};
use crate::core::resource::Resource;
use serde_json::{Value, json};

pub const CONTENT_TYPE: &str = "application/json";

/// Properties with relationships nested inline, links as top-level urls
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

fn tree(resource: &Resource) -> Result<Value, RelationshipError> {
    let mut properties = resource.public_properties()?;
    for related in resource.related_resources()? {
        properties.insert(related.name.clone(), map_related(related, tree)?);
    }
    Ok(Value::Object(properties))
}

impl Adapter for JsonAdapter {
    fn formats(&self) -> &'static [&'static str] {
        &[CONTENT_TYPE]
    }

    fn document(&self, resource: &Resource, base_url: &str) -> Result<Value, RelationshipError> {
        let mut document = Properties::new();
        document.insert(resource.resource_type().resource_name.clone(), tree(resource)?);

        let mut links = Properties::new();
        for linked in resource.linked_resources()? {
            let url = map_related(linked, |child| Ok(Value::String(child.url(base_url))))?;
            links.insert(linked.name.clone(), url);
        }
        if !links.is_empty() {
            document.insert("links".to_string(), Value::Object(links));
        }
        if !resource.errors().is_empty() {
            document.insert("errors".to_string(), json!(resource.errors()));
        }
        Ok(Value::Object(document))
    }

    fn error_document(&self, detail: &ErrorDetail) -> Value {
        json!(detail)
    }
}
