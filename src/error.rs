//! Error types for the PagerDuty provider.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced to the orchestrator by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A compound identifier could not be split into its two IDs.
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// The parent entity could not be fetched during a read.
    #[error("Failed to fetch {kind} {id}: {source}")]
    EntityNotFound {
        /// Entity kind, e.g. `team`.
        kind: &'static str,
        /// ID that was requested.
        id: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The store refused to create a link, or kept failing until the deadline.
    #[error("Failed to create link {id}: {source}")]
    LinkCreationFailed {
        /// Compound ID of the link being created.
        id: String,
        /// Last error returned by the store.
        #[source]
        source: StoreError,
    },

    /// The store refused to remove a link.
    #[error("Failed to delete link {id}: {source}")]
    LinkDeletionFailed {
        /// Compound ID of the link being removed.
        id: String,
        /// Error returned by the store.
        #[source]
        source: StoreError,
    },

    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// An attribute change cannot be applied in place.
    #[error("Requires replacement: {0}")]
    RequiresReplace(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Store-backed variants return the compound ID they concern; the store
    /// error is available through [`std::error::Error::source`].
    pub fn message(&self) -> &str {
        match self {
            Self::MalformedIdentifier(msg) => msg,
            Self::EntityNotFound { id, .. } => id,
            Self::LinkCreationFailed { id, .. } => id,
            Self::LinkDeletionFailed { id, .. } => id,
            Self::NotFound(msg) => msg,
            Self::RequiresReplace(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
        }
    }

    /// The store error behind this failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::EntityNotFound { source, .. }
            | Self::LinkCreationFailed { source, .. }
            | Self::LinkDeletionFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
