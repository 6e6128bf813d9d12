//! Create, read and delete for association links.
//!
//! A link moves through [`LinkState`]: `Absent → Creating → Present` on
//! create and `Present → Deleting → Absent` on delete. A read that no longer
//! finds the child in its parent's list moves it straight to `Absent`; that
//! is drift, not an error, and the caller drops the resource from state.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::ProviderError;
use crate::id::Relationship;
use crate::resources::LinkKind;
use crate::retry::{retry_until, RetryPolicy};
use crate::store::{is_member, EntityStore};

/// Where a link stands relative to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link exists.
    Absent,
    /// Link creation is in flight.
    Creating,
    /// The link exists remotely.
    Present,
    /// Link removal is in flight.
    Deleting,
}

fn transition(id: &str, from: LinkState, to: LinkState) {
    debug!(id, ?from, ?to, "Link state transition");
}

/// Drives links of any [`LinkKind`] against an [`EntityStore`].
pub struct LinkLifecycle<S: EntityStore> {
    store: Arc<S>,
    create_retry: RetryPolicy,
}

impl<S: EntityStore> Clone for LinkLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            create_retry: self.create_retry,
        }
    }
}

impl<S: EntityStore> LinkLifecycle<S> {
    /// Create a lifecycle controller. `create_retry` bounds link creation.
    pub fn new(store: Arc<S>, create_retry: RetryPolicy) -> Self {
        Self {
            store,
            create_retry,
        }
    }

    /// The store links are reconciled against.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The retry policy applied to link creation.
    pub fn create_retry(&self) -> &RetryPolicy {
        &self.create_retry
    }

    /// Link the child to the parent and return the compound ID.
    #[instrument(skip(self, link), fields(parent = %link.parent_id, child = %link.child_id))]
    pub async fn create(&self, kind: LinkKind, link: &Relationship) -> Result<String, ProviderError> {
        let id = link.id();
        transition(&id, LinkState::Absent, LinkState::Creating);

        let store: &S = &self.store;
        let result = retry_until(&self.create_retry, || store.add_link(kind, link)).await;

        match result {
            Ok(()) => {
                transition(&id, LinkState::Creating, LinkState::Present);
                info!(id = %id, "Created {}", kind);
                Ok(id)
            },
            Err(source) => {
                transition(&id, LinkState::Creating, LinkState::Absent);
                Err(ProviderError::LinkCreationFailed { id, source })
            },
        }
    }

    /// Check that the link behind `id` still exists.
    ///
    /// Returns `Ok(None)` when the parent no longer lists the child.
    #[instrument(skip(self))]
    pub async fn read(&self, kind: LinkKind, id: &str) -> Result<Option<Relationship>, ProviderError> {
        let link = Relationship::from_id(id)?;

        let parent = self
            .store
            .get(kind, &link.parent_id)
            .await
            .map_err(|source| ProviderError::EntityNotFound {
                kind: kind.parent_entity(),
                id: link.parent_id.clone(),
                source,
            })?;

        if !is_member(&parent, &link.child_id) {
            warn!(
                id,
                "{} {} is no longer linked to {} {}, removing from state",
                kind.child_entity(),
                link.child_id,
                kind.parent_entity(),
                link.parent_id
            );
            transition(id, LinkState::Present, LinkState::Absent);
            return Ok(None);
        }

        Ok(Some(link))
    }

    /// Remove the link behind `id`.
    #[instrument(skip(self))]
    pub async fn delete(&self, kind: LinkKind, id: &str) -> Result<(), ProviderError> {
        let link = Relationship::from_id(id)?;
        transition(id, LinkState::Present, LinkState::Deleting);

        // Single attempt; only creation is retried.
        if let Err(source) = self.store.remove_link(kind, &link).await {
            transition(id, LinkState::Deleting, LinkState::Present);
            return Err(ProviderError::LinkDeletionFailed {
                id: id.to_string(),
                source,
            });
        }

        transition(id, LinkState::Deleting, LinkState::Absent);
        info!(id, "Deleted {}", kind);
        Ok(())
    }
}
