//! Persistence manager contract
//!
//! The framework never talks to a store itself. Each resource type with CRUD
//! endpoints is bound to a [`Manager`] that turns lookup keys and values into
//! property maps. The framework is agnostic to the underlying storage.

use crate::core::Properties;
use crate::core::error::{NotFoundError, RestGraphError};
use crate::core::field::Field;
use crate::core::pagination::Cursor;
use async_trait::async_trait;

/// Failure reported by a manager
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<ManagerError> for RestGraphError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::NotFound(e) => RestGraphError::NotFound(e),
            ManagerError::Conflict(message) => RestGraphError::Conflict(message),
            ManagerError::Backend(e) => RestGraphError::Manager(e),
        }
    }
}

/// Which page of a collection to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Primary key values the page starts after; empty for the first page
    pub after: Vec<String>,
    pub page_size: usize,
}

/// One page of a collection plus the cursors around it
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<Properties>,
    /// Absent on the last page
    pub next: Option<Cursor>,
    /// Absent on the first page
    pub previous: Option<Cursor>,
}

impl ListPage {
    pub fn new(items: Vec<Properties>) -> Self {
        Self {
            items,
            next: None,
            previous: None,
        }
    }

    pub fn with_next(mut self, cursor: Cursor) -> Self {
        self.next = Some(cursor);
        self
    }

    pub fn with_previous(mut self, cursor: Cursor) -> Self {
        self.previous = Some(cursor);
        self
    }
}

/// CRUD operations over a backing store
///
/// Lookup maps contain exactly the primary keys of the resource type,
/// already translated to their declared kinds.
#[async_trait]
pub trait Manager: Send + Sync {
    /// Fields the manager reads and writes
    fn fields(&self) -> &[Field];

    /// Fields accepted on create; defaults to [`Manager::fields`]
    fn create_fields(&self) -> &[Field] {
        self.fields()
    }

    /// Fields accepted on update; defaults to [`Manager::fields`]
    fn update_fields(&self) -> &[Field] {
        self.fields()
    }

    /// Fields usable as list filters; defaults to [`Manager::fields`]
    fn list_fields(&self) -> &[Field] {
        self.fields()
    }

    /// Page size used when the request does not set `count`; `None` defers
    /// to the server's configured default
    fn paginate_by(&self) -> Option<usize> {
        None
    }

    async fn create(&self, values: Properties) -> Result<Properties, ManagerError>;

    async fn retrieve(&self, lookup: &Properties) -> Result<Properties, ManagerError>;

    async fn retrieve_list(
        &self,
        filters: &Properties,
        page: &PageRequest,
    ) -> Result<ListPage, ManagerError>;

    async fn update(
        &self,
        lookup: &Properties,
        updates: Properties,
    ) -> Result<Properties, ManagerError>;

    async fn delete(&self, lookup: &Properties) -> Result<(), ManagerError>;
}
