//! In-memory implementation of Manager for testing and development

use crate::core::Properties;
use crate::core::error::NotFoundError;
use crate::core::field::{Field, FieldKind};
use crate::core::manager::{ListPage, Manager, ManagerError, PageRequest};
use crate::core::pagination::{Cursor, param_value};
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// One component of a primary key tuple; integers sort numerically
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Int(i64),
    Text(String),
}

type Key = Vec<KeyPart>;

/// In-memory manager
///
/// Records are kept ordered by primary key tuple, which is also the order
/// pages are read in. Uses RwLock for thread-safe access.
#[derive(Clone)]
pub struct InMemoryManager {
    name: String,
    fields: Vec<Field>,
    primary_keys: Vec<String>,
    page_size: Option<usize>,
    records: Arc<RwLock<BTreeMap<Key, Properties>>>,
}

impl InMemoryManager {
    /// Create a new in-memory manager
    ///
    /// `name` is only used in not-found messages.
    pub fn new<I, S>(name: impl Into<String>, fields: Vec<Field>, primary_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields,
            primary_keys: primary_keys.into_iter().map(Into::into).collect(),
            page_size: None,
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Page size used when a request does not set `count`
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    fn pk_kind(&self, pk: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == pk).map(|f| f.kind)
    }

    fn key_part(&self, pk: &str, value: &Value) -> KeyPart {
        match (self.pk_kind(pk), value.as_i64()) {
            (Some(FieldKind::Integer), Some(n)) => KeyPart::Int(n),
            _ => KeyPart::Text(param_value(value)),
        }
    }

    /// Key of a record or lookup map; `None` if a primary key is missing
    fn key_of(&self, properties: &Properties) -> Option<Key> {
        self.primary_keys
            .iter()
            .map(|pk| {
                properties
                    .get(pk)
                    .filter(|v| !v.is_null())
                    .map(|v| self.key_part(pk, v))
            })
            .collect()
    }

    /// Key from page tokens, parsed with the declared key kinds
    fn key_from_tokens(&self, tokens: &[String]) -> Option<Key> {
        if tokens.len() != self.primary_keys.len() {
            return None;
        }
        self.primary_keys
            .iter()
            .zip(tokens)
            .map(|(pk, token)| match self.pk_kind(pk) {
                Some(FieldKind::Integer) => token.parse().ok().map(KeyPart::Int),
                _ => Some(KeyPart::Text(token.clone())),
            })
            .collect()
    }

    fn tokens_of(&self, record: &Properties) -> Vec<String> {
        self.primary_keys
            .iter()
            .filter_map(|pk| record.get(pk))
            .map(param_value)
            .collect()
    }

    /// Fill a missing single primary key: next integer or a new UUID
    fn generate_key(&self, values: &mut Properties, records: &BTreeMap<Key, Properties>) {
        let [pk] = self.primary_keys.as_slice() else {
            return;
        };
        if values.get(pk).is_some_and(|v| !v.is_null()) {
            return;
        }
        let generated = match self.pk_kind(pk) {
            Some(FieldKind::Integer) => {
                let last = records.keys().rev().find_map(|key| match key.first() {
                    Some(KeyPart::Int(n)) => Some(*n),
                    _ => None,
                });
                Value::from(last.unwrap_or(0) + 1)
            }
            _ => Value::String(Uuid::new_v4().to_string()),
        };
        values.insert(pk.clone(), generated);
    }

    fn lock_error<E: std::fmt::Display>(e: E) -> ManagerError {
        ManagerError::Backend(anyhow!("Failed to acquire lock: {}", e))
    }

    fn not_found(&self, lookup: &Properties) -> ManagerError {
        ManagerError::NotFound(NotFoundError::new(&self.name, lookup))
    }
}

/// Equality per filter; a list filter matches a scalar that is one of its
/// values, or a list sharing at least one value with it
fn matches(record: &Properties, filters: &Properties) -> bool {
    filters.iter().all(|(key, expected)| {
        let actual = record.get(key).unwrap_or(&Value::Null);
        match (expected, actual) {
            (Value::Array(options), Value::Array(values)) => {
                values.iter().any(|value| options.contains(value))
            }
            (Value::Array(options), _) => options.contains(actual),
            _ => actual == expected,
        }
    })
}

#[async_trait]
impl Manager for InMemoryManager {
    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn paginate_by(&self) -> Option<usize> {
        self.page_size
    }

    async fn create(&self, mut values: Properties) -> Result<Properties, ManagerError> {
        let mut records = self.records.write().map_err(Self::lock_error)?;
        self.generate_key(&mut values, &records);

        let key = self
            .key_of(&values)
            .ok_or_else(|| anyhow!("{} is missing primary key values", self.name))?;
        if records.contains_key(&key) {
            return Err(ManagerError::Conflict(format!(
                "{} with key {:?} already exists",
                self.name,
                self.tokens_of(&values)
            )));
        }
        records.insert(key, values.clone());
        Ok(values)
    }

    async fn retrieve(&self, lookup: &Properties) -> Result<Properties, ManagerError> {
        let records = self.records.read().map_err(Self::lock_error)?;
        self.key_of(lookup)
            .and_then(|key| records.get(&key).cloned())
            .ok_or_else(|| self.not_found(lookup))
    }

    async fn retrieve_list(
        &self,
        filters: &Properties,
        page: &PageRequest,
    ) -> Result<ListPage, ManagerError> {
        let records = self.records.read().map_err(Self::lock_error)?;
        let matching: Vec<(&Key, &Properties)> = records
            .iter()
            .filter(|(_, record)| matches(record, filters))
            .collect();

        let start = match self.key_from_tokens(&page.after) {
            Some(after) => matching.partition_point(|(key, _)| **key <= after),
            None => 0,
        };
        let size = page.page_size.max(1);
        let end = (start + size).min(matching.len());

        let items: Vec<Properties> = matching[start..end]
            .iter()
            .map(|(_, record)| (*record).clone())
            .collect();
        let mut listed = ListPage::new(items);

        if end < matching.len() {
            listed = listed.with_next(Cursor::new(self.tokens_of(matching[end - 1].1), size));
        }
        if start > 0 {
            let previous_start = start.saturating_sub(size);
            let token = if previous_start == 0 {
                Vec::new()
            } else {
                self.tokens_of(matching[previous_start - 1].1)
            };
            listed = listed.with_previous(Cursor::new(token, size));
        }
        Ok(listed)
    }

    async fn update(
        &self,
        lookup: &Properties,
        updates: Properties,
    ) -> Result<Properties, ManagerError> {
        let mut records = self.records.write().map_err(Self::lock_error)?;
        let key = self.key_of(lookup).ok_or_else(|| self.not_found(lookup))?;
        let record = records
            .get_mut(&key)
            .ok_or_else(|| self.not_found(lookup))?;
        for (field, value) in updates {
            // primary keys are the record's identity
            if !self.primary_keys.contains(&field) {
                record.insert(field, value);
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, lookup: &Properties) -> Result<(), ManagerError> {
        let mut records = self.records.write().map_err(Self::lock_error)?;
        let key = self.key_of(lookup).ok_or_else(|| self.not_found(lookup))?;
        records
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| self.not_found(lookup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn people() -> InMemoryManager {
        InMemoryManager::new(
            "Person",
            vec![
                Field::integer("id"),
                Field::string("first_name"),
                Field::string("last_name"),
            ],
            ["id"],
        )
    }

    async fn seed(manager: &InMemoryManager, n: usize) {
        for i in 0..n {
            let last_name = if i % 2 == 0 { "Even" } else { "Odd" };
            manager
                .create(props(json!({"first_name": format!("P{}", i), "last_name": last_name})))
                .await
                .unwrap();
        }
    }

    fn page(after: &[&str], page_size: usize) -> PageRequest {
        PageRequest {
            after: after.iter().map(|s| s.to_string()).collect(),
            page_size,
        }
    }

    #[tokio::test]
    async fn test_create_generates_sequential_integer_ids() {
        let manager = people();
        let first = manager.create(props(json!({"first_name": "A"}))).await.unwrap();
        let second = manager.create(props(json!({"first_name": "B"}))).await.unwrap();
        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
    }

    #[tokio::test]
    async fn test_create_generates_uuid_for_string_keys() {
        let manager = InMemoryManager::new("Tag", vec![Field::string("name")], ["id"]);
        let created = manager.create(props(json!({"name": "rust"}))).await.unwrap();
        let id = created["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_create_duplicate_key_conflicts() {
        let manager = people();
        manager.create(props(json!({"id": 5}))).await.unwrap();
        let err = manager.create(props(json!({"id": 5}))).await.unwrap_err();
        assert!(matches!(err, ManagerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_retrieve_update_delete() {
        let manager = people();
        seed(&manager, 1).await;
        let lookup = props(json!({"id": 1}));

        let updated = manager
            .update(&lookup, props(json!({"last_name": "Doe", "id": 99})))
            .await
            .unwrap();
        assert_eq!(updated["last_name"], json!("Doe"));
        assert_eq!(updated["id"], json!(1));
        assert_eq!(manager.retrieve(&lookup).await.unwrap(), updated);

        manager.delete(&lookup).await.unwrap();
        assert!(matches!(
            manager.retrieve(&lookup).await,
            Err(ManagerError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete(&lookup).await,
            Err(ManagerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_keyset_pages_and_cursors() {
        let manager = people();
        seed(&manager, 5).await;

        let first = manager.retrieve_list(&Properties::new(), &page(&[], 2)).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.previous.is_none());
        let next = first.next.unwrap();
        assert_eq!(next.page_token, vec!["2"]);

        let second = manager
            .retrieve_list(&Properties::new(), &page(&["2"], 2))
            .await
            .unwrap();
        assert_eq!(second.items[0]["id"], json!(3));
        assert_eq!(second.previous.unwrap().page_token, Vec::<String>::new());

        let last = manager
            .retrieve_list(&Properties::new(), &page(&["4"], 2))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(last.next.is_none());
        assert_eq!(last.previous.unwrap().page_token, vec!["2"]);
    }

    #[tokio::test]
    async fn test_pages_survive_deleting_seen_rows() {
        let manager = people();
        seed(&manager, 6).await;
        manager.delete(&props(json!({"id": 1}))).await.unwrap();
        manager.delete(&props(json!({"id": 2}))).await.unwrap();
        let listed = manager
            .retrieve_list(&Properties::new(), &page(&["2"], 2))
            .await
            .unwrap();
        let ids: Vec<&Value> = listed.items.iter().map(|i| &i["id"]).collect();
        assert_eq!(ids, vec![&json!(3), &json!(4)]);
    }

    #[tokio::test]
    async fn test_equality_filters() {
        let manager = people();
        seed(&manager, 5).await;
        let filters = props(json!({"last_name": "Odd"}));
        let listed = manager.retrieve_list(&filters, &page(&[], 10)).await.unwrap();
        let ids: Vec<&Value> = listed.items.iter().map(|i| &i["id"]).collect();
        assert_eq!(ids, vec![&json!(2), &json!(4)]);
    }

    #[tokio::test]
    async fn test_list_filter_matches_any_shared_value() {
        let manager = InMemoryManager::new(
            "Ticket",
            vec![Field::integer("id"), Field::new("status", FieldKind::List)],
            ["id"],
        );
        for status in [json!(["a", "b"]), json!(["a"]), json!(["c"]), json!([])] {
            manager.create(props(json!({"status": status}))).await.unwrap();
        }

        let filters = props(json!({"status": ["b", "c"]}));
        let listed = manager.retrieve_list(&filters, &page(&[], 10)).await.unwrap();
        let ids: Vec<&Value> = listed.items.iter().map(|i| &i["id"]).collect();
        assert_eq!(ids, vec![&json!(1), &json!(3)]);
    }

    #[tokio::test]
    async fn test_list_filter_on_scalar_means_one_of() {
        let manager = people();
        seed(&manager, 4).await;
        let filters = props(json!({"first_name": ["P0", "P3", "P9"]}));
        let listed = manager.retrieve_list(&filters, &page(&[], 10)).await.unwrap();
        let ids: Vec<&Value> = listed.items.iter().map(|i| &i["id"]).collect();
        assert_eq!(ids, vec![&json!(1), &json!(4)]);
    }

    #[tokio::test]
    async fn test_integer_keys_sort_numerically() {
        let manager = people();
        seed(&manager, 12).await;
        let listed = manager
            .retrieve_list(&Properties::new(), &page(&["9"], 2))
            .await
            .unwrap();
        let ids: Vec<&Value> = listed.items.iter().map(|i| &i["id"]).collect();
        assert_eq!(ids, vec![&json!(10), &json!(11)]);
    }
}
