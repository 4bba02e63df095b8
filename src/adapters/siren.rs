//! SIREN: classes, properties, sub-entities, actions and links
//!
//! Embedded relationships become full sub-entities; the others are
//! embedded links carrying only `href`. Actions are listed for every
//! endpoint whose route can be filled from the entity's properties.

use super::Adapter;
use crate::core::Properties;
use crate::core::error::{ErrorDetail, RelationshipError};
use crate::core::resource::Resource;
use serde_json::{Value, json};

pub const CONTENT_TYPE: &str = "application/vnd.siren+json";

#[derive(Debug, Clone, Copy, Default)]
pub struct SirenAdapter;

fn class(resource: &Resource) -> Value {
    json!([resource.resource_type().resource_name])
}

fn entity(resource: &Resource, base_url: &str) -> Result<Properties, RelationshipError> {
    let mut entities = Vec::new();
    for related in resource.related_resources()? {
        for child in related.related.iter() {
            let sub_entity = if related.embedded {
                let mut sub_entity = entity(child, base_url)?;
                sub_entity.insert("rel".to_string(), json!([related.name]));
                Value::Object(sub_entity)
            } else {
                json!({
                    "class": class(child),
                    "rel": [related.name],
                    "href": child.url(base_url),
                })
            };
            entities.push(sub_entity);
        }
    }

    let actions: Vec<Value> = resource
        .actions()
        .into_iter()
        .map(|action| {
            json!({
                "name": action.name,
                "title": action.name.replace('_', " "),
                "method": action.method.as_str(),
                "href": format!("{}{}", base_url.trim_end_matches('/'), action.path),
                "type": "application/json",
                "fields": action.fields,
            })
        })
        .collect();

    let mut links = vec![json!({"rel": ["self"], "href": resource.url(base_url)})];
    for linked in resource.linked_resources()? {
        for child in linked.related.iter() {
            links.push(json!({"rel": [linked.name], "href": child.url(base_url)}));
        }
    }

    let mut document = Properties::new();
    document.insert("class".to_string(), class(resource));
    document.insert("properties".to_string(), Value::Object(resource.public_properties()?));
    document.insert("entities".to_string(), Value::Array(entities));
    document.insert("actions".to_string(), Value::Array(actions));
    document.insert("links".to_string(), Value::Array(links));
    Ok(document)
}

impl Adapter for SirenAdapter {
    fn formats(&self) -> &'static [&'static str] {
        &[CONTENT_TYPE]
    }

    fn document(&self, resource: &Resource, base_url: &str) -> Result<Value, RelationshipError> {
        entity(resource, base_url).map(Value::Object)
    }

    fn error_document(&self, detail: &ErrorDetail) -> Value {
        json!({
            "class": ["error"],
            "properties": detail,
            "links": [],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fixtures;

    fn document() -> Value {
        let registry = fixtures::registry();
        SirenAdapter
            .document(&fixtures::post(&registry), fixtures::BASE_URL)
            .unwrap()
    }

    #[test]
    fn test_entities_split_by_embedding() {
        let document = document();
        let entities = document["entities"].as_array().unwrap();
        assert_eq!(entities.len(), 2);

        let author = &entities[0];
        assert_eq!(author["rel"], json!(["author"]));
        assert_eq!(author["properties"], json!({"id": 7, "name": "Ann"}));
        assert!(author.get("href").is_none());

        let editor = &entities[1];
        assert_eq!(editor["rel"], json!(["editor"]));
        assert_eq!(editor["href"], json!("http://api.test/users/8"));
        assert!(editor.get("properties").is_none());
    }

    #[test]
    fn test_links_and_properties() {
        let document = document();
        assert_eq!(document["class"], json!(["posts"]));
        assert_eq!(document["properties"], json!({"id": 1, "title": "Hello"}));
        assert_eq!(
            document["links"],
            json!([
                {"rel": ["self"], "href": "http://api.test/posts/1"},
                {"rel": ["related"], "href": "http://api.test/posts/2"},
            ])
        );
    }

    #[test]
    fn test_actions_only_for_fillable_routes() {
        let document = document();
        let actions: Vec<(&str, &str)> = document["actions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| (a["name"].as_str().unwrap(), a["href"].as_str().unwrap()))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("publish", "http://api.test/posts/1/publish"),
                ("feed", "http://api.test/posts/feed"),
            ]
        );
        assert_eq!(document["actions"][0]["method"], json!("POST"));
    }

    #[test]
    fn test_error_document() {
        let detail = ErrorDetail::internal();
        let document = SirenAdapter.error_document(&detail);
        assert_eq!(document["class"], json!(["error"]));
        assert_eq!(document["properties"]["status"], json!(500));
        assert_eq!(
            document["properties"]["message"],
            json!("An internal error occurred")
        );
    }
}
