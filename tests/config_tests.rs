//! Tests for serving an API declared in a YAML file

use axum::http::StatusCode;
use axum_test::TestServer;
use restgraph::core::FieldKind;
use restgraph::core::error::ConfigError;
use restgraph::prelude::*;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
server:
  base_url: "https://api.example.com/"
  default_format: application/hal+json
  default_page_size: 2
resources:
  - name: Person
    primary_keys: [id]
    manager: people
    endpoints: [create, retrieve, retrieve_list, update, delete]
    relationships:
      - name: address
        target: Address
        embedded: true
  - name: Address
    primary_keys: [id]
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

fn managers() -> HashMap<String, Arc<dyn Manager>> {
    let people: Arc<dyn Manager> = Arc::new(InMemoryManager::new(
        "Person",
        vec![
            Field::integer("id"),
            Field::string("first_name").required(),
            Field::new("address", FieldKind::Dict),
        ],
        ["id"],
    ));
    HashMap::from([("people".to_string(), people)])
}

fn server_from(file: &NamedTempFile) -> TestServer {
    let config = RestGraphConfig::from_yaml_file(file.path()).expect("config parses");
    let app = ServerBuilder::new()
        .declare_from_config(&config, &managers())
        .expect("config declares cleanly")
        .with_standard_adapters()
        .build()
        .expect("Failed to build router");
    TestServer::new(app).expect("Failed to create test server")
}

#[tokio::test]
async fn test_yaml_declared_api_serves_hal_with_base_url() {
    let file = write_config(CONFIG);
    let server = server_from(&file);

    let response = server
        .post("/people")
        .json(&json!({
            "first_name": "Ada",
            "address": {"id": 3, "city": "London"},
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(
        response.json::<Value>(),
        json!({
            "_links": {"self": {"href": "https://api.example.com/people/1"}},
            "_embedded": {
                "address": {
                    "_links": {"self": {"href": "https://api.example.com/addresses/3"}},
                    "id": 3,
                    "city": "London",
                }
            },
            "id": 1,
            "first_name": "Ada",
        })
    );
}

#[tokio::test]
async fn test_yaml_page_size_applies_to_lists() {
    let file = write_config(CONFIG);
    let server = server_from(&file);
    for name in ["Ada", "Grace", "Barbara"] {
        server.post("/people").json(&json!({"first_name": name})).await;
    }

    let page: Value = server.get("/people").await.json();

    assert_eq!(page["_embedded"]["people"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        page["_links"]["next"]["href"],
        json!("https://api.example.com/people?count=2&pagination_pk=2")
    );
}

#[test]
fn test_unknown_manager_key_is_reported() {
    let file = write_config(
        r#"
resources:
  - name: Person
    primary_keys: [id]
    manager: humans
    endpoints: [retrieve]
"#,
    );
    let config = RestGraphConfig::from_yaml_file(file.path()).unwrap();

    let err = ServerBuilder::new()
        .declare_from_config(&config, &managers())
        .err()
        .unwrap();

    match err {
        ConfigError::UnknownManager { key, resource } => {
            assert_eq!(key, "humans");
            assert_eq!(resource, "Person");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_crud_endpoint_without_manager_is_rejected() {
    let config = RestGraphConfig::from_yaml_str(
        r#"
resources:
  - name: Person
    primary_keys: [id]
    endpoints: [retrieve]
"#,
    )
    .unwrap();

    let err = ServerBuilder::new()
        .declare_from_config(&config, &HashMap::new())
        .err()
        .unwrap();

    assert!(matches!(err, ConfigError::MissingManager { .. }));
}

#[test]
fn test_invalid_yaml_names_the_file() {
    let file = write_config("resources: [name: {");

    let err = RestGraphConfig::from_yaml_file(file.path()).unwrap_err();

    assert_eq!(err.error_code(), "CONFIG_PARSE_ERROR");
    let path = file.path().display().to_string();
    assert!(err.to_string().contains(&path), "{err} should name {path}");
}
