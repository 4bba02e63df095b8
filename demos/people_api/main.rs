//! People API example
//!
//! This example demonstrates:
//! - A `Person` resource backed by the in-memory manager
//! - An `Address` resource embedded in every person
//! - A custom `greeting` endpoint next to the CRUD ones
//! - Every standard media type, negotiated per request
//!
//! ```text
//! curl -X POST localhost:3000/people -d '{"first_name":"Ada","last_name":"Lovelace"}'
//! curl -H 'Accept: application/hal+json' localhost:3000/people
//! curl 'localhost:3000/people/1/greeting?format=application/vnd.siren%2Bjson'
//! ```

use restgraph::core::error::NotFoundError;
use restgraph::prelude::*;
use tracing_subscriber::EnvFilter;

/// Answers `GET /people/{id}/greeting`
struct Greeting;

#[async_trait]
impl EndpointHandler for Greeting {
    async fn handle(
        &self,
        ctx: &EndpointContext,
        request: RequestContainer,
    ) -> restgraph::core::Result<Resource> {
        let lookup = ctx.lookup(&request)?;
        let manager = ctx
            .resource_type()
            .manager
            .clone()
            .ok_or_else(|| NotFoundError::new("Person", &lookup))?;
        let person = manager.retrieve(&lookup).await?;

        let first_name = person
            .get("first_name")
            .and_then(Value::as_str)
            .unwrap_or("stranger");
        let mut properties = lookup;
        properties.insert(
            "greeting".to_string(),
            json!(format!("Hello, {first_name}!")),
        );
        Ok(ctx.resource(properties))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let people = Arc::new(
        InMemoryManager::new(
            "Person",
            vec![
                Field::integer("id"),
                Field::string("first_name").required().not_null(),
                Field::string("last_name").required().not_null(),
                Field::integer("age").minimum(0.0),
            ],
            ["id"],
        )
        .with_page_size(10),
    );

    let person = ResourceType::builder("Person")
        .primary_keys(["id"])
        .manager(people)
        .crud(CrudOperation::ALL)
        .relationship(Relationship::one("address", "Address").embedded())
        .custom_endpoint(EndpointDescriptor::custom("greeting", "/greeting", Greeting));

    let address = ResourceType::builder("Address")
        .resource_name("addresses")
        .primary_keys(["id"]);

    ServerBuilder::new()
        .declare(person)?
        .declare(address)?
        .with_standard_adapters()
        .serve("127.0.0.1:3000")
        .await
}
