//! The remote entity store that association resources are reconciled against.
//!
//! The store is the only source of truth: nothing fetched here is cached
//! beyond the operation that fetched it. Implementations wrap the vendor
//! REST client; [`crate::testing::MemoryStore`] is an in-memory stand-in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::Relationship;
use crate::resources::LinkKind;
use crate::retry::Retryable;

/// Errors returned by an [`EntityStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The API answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),
}

impl StoreError {
    /// Create an error for an HTTP status response.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// The HTTP status code, if the API responded.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(_) => None,
        }
    }

    /// Whether the API reported a server-side (5xx) failure.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code(), Some(500..=599))
    }
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        self.is_server_error()
    }
}

/// A reference to a child entity in a parent's membership list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    /// The child's ID.
    pub id: String,
}

impl ChildRef {
    /// Create a child reference.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A parent entity as fetched from the store, with its current children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentEntity {
    /// The parent's ID.
    pub id: String,
    /// Children currently linked to the parent, in no particular order.
    #[serde(default)]
    pub children: Vec<ChildRef>,
}

impl ParentEntity {
    /// Create a parent entity with the given child IDs.
    pub fn new<I, T>(id: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            children: children.into_iter().map(ChildRef::new).collect(),
        }
    }
}

/// Whether `child_id` appears in the parent's children.
pub fn is_member(parent: &ParentEntity, child_id: &str) -> bool {
    parent.children.iter().any(|child| child.id == child_id)
}

/// Operations the provider needs from the remote API.
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync + 'static {
    /// Fetch the parent side of `kind` with its current children.
    async fn get(&self, kind: LinkKind, parent_id: &str) -> Result<ParentEntity, StoreError>;

    /// Link the child to the parent.
    async fn add_link(&self, kind: LinkKind, link: &Relationship) -> Result<(), StoreError>;

    /// Unlink the child from the parent.
    async fn remove_link(&self, kind: LinkKind, link: &Relationship) -> Result<(), StoreError>;
}
