//! Hemmer provider for PagerDuty association resources
//!
//! This crate manages the "X is linked to Y" resources of PagerDuty: team
//! memberships and the automation-action associations with teams and
//! services. Each association is identified by a compound ID of the form
//! `child_id:parent_id` and is observed through the parent entity's member
//! list.
//!
//! # Overview
//!
//! - **Identifiers** ([`id`]): encoding and decoding of compound IDs
//! - **Store** ([`store`]): the [`EntityStore`] seam to the PagerDuty API and
//!   the membership predicate
//! - **Retry** ([`retry`]): deadline-bounded retry with exponential backoff
//! - **Lifecycle** ([`lifecycle`]): create with retry, read with drift
//!   detection, single-attempt delete
//! - **Resources** ([`resources`]): typed state for each association kind
//! - **Provider** ([`provider`]): [`ProviderService`] implementation driving
//!   all of the above
//! - **Testing** ([`testing`]): an in-memory store and a provider harness
//!
//! # Quick Start
//!
//! ```
//! use hemmer_provider_pagerduty::testing::MemoryStore;
//! use hemmer_provider_pagerduty::{LinkKind, PagerDutyProvider, ProviderService};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), hemmer_provider_pagerduty::ProviderError> {
//! let store = MemoryStore::new().with_parent(LinkKind::TeamMembership, "PTEAM01", ["PUSER02"]);
//! let provider = PagerDutyProvider::new(store);
//!
//! let state = provider
//!     .create(
//!         "pagerduty_team_membership",
//!         json!({"user_id": "PUSER01", "team_id": "PTEAM01"}),
//!     )
//!     .await?;
//! assert_eq!(state["id"], "PUSER01:PTEAM01");
//!
//! let current = provider.read("pagerduty_team_membership", state).await?;
//! assert!(current.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! # Drift
//!
//! When a link is removed outside of the provider, [`ProviderService::read`]
//! returns `Ok(None)` so the orchestrator can drop the resource from state
//! and plan to recreate it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod service;
pub mod store;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use id::Relationship;
pub use lifecycle::{LinkLifecycle, LinkState};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::PagerDutyProvider;
pub use resources::{
    ActionServiceAssociation, ActionTeamAssociation, LinkKind, LinkResource,
    RunnerTeamAssociation, TeamMembership,
};
pub use retry::{retry_until, RetryPolicy, Retryable};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use store::{is_member, EntityStore, ParentEntity, StoreError};
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::validate;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
