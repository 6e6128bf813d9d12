//! Testing utilities for the provider.
//!
//! [`MemoryStore`] is an in-memory [`EntityStore`] with scripted failures,
//! and [`ProviderTester`] drives any [`ProviderService`] through the same
//! sequences the orchestrator would, without a real API behind it.
//!
//! # Example
//!
//! ```ignore
//! use hemmer_provider_pagerduty::testing::{MemoryStore, ProviderTester};
//! use hemmer_provider_pagerduty::{LinkKind, PagerDutyProvider};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_membership() {
//!     let store = MemoryStore::new().with_parent(LinkKind::TeamMembership, "PTEAM01", ["PUSER02"]);
//!     let tester = ProviderTester::new(PagerDutyProvider::new(store));
//!
//!     let state = tester
//!         .lifecycle_create("pagerduty_team_membership", json!({
//!             "user_id": "PUSER01",
//!             "team_id": "PTEAM01",
//!         }))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["id"], "PUSER01:PTEAM01");
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::ProviderError;
use crate::id::Relationship;
use crate::resources::LinkKind;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::store::{EntityStore, ParentEntity, StoreError};
use crate::types::{ImportedResource, PlanResult};

// =========================================================================
// In-memory store
// =========================================================================

/// An error to return for the next `remaining` calls.
#[derive(Debug, Clone)]
struct ScriptedFailure {
    error: StoreError,
    remaining: usize,
}

impl ScriptedFailure {
    fn take(slot: &mut Option<ScriptedFailure>) -> Option<StoreError> {
        let failure = slot.as_mut()?;
        let error = failure.error.clone();
        failure.remaining = failure.remaining.saturating_sub(1);
        if failure.remaining == 0 {
            *slot = None;
        }
        Some(error)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    parents: HashMap<(LinkKind, String), Vec<String>>,
    get_failure: Option<ScriptedFailure>,
    add_failure: Option<ScriptedFailure>,
    remove_failure: Option<ScriptedFailure>,
}

/// An in-memory [`EntityStore`].
///
/// Parents must be seeded before links can be added to them; fetching or
/// linking to an unknown parent answers with a 404, as the API does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    get_calls: AtomicUsize,
    add_link_calls: AtomicUsize,
    remove_link_calls: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a parent entity with the given children.
    pub fn with_parent<I, T>(self, kind: LinkKind, parent_id: &str, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.lock().parents.insert(
            (kind, parent_id.to_string()),
            children.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Current children of a parent, in insertion order. Empty if unknown.
    pub fn children(&self, kind: LinkKind, parent_id: &str) -> Vec<String> {
        self.lock()
            .parents
            .get(&(kind, parent_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a child behind the provider's back.
    pub fn unlink(&self, kind: LinkKind, parent_id: &str, child_id: &str) {
        if let Some(children) = self.lock().parents.get_mut(&(kind, parent_id.to_string())) {
            children.retain(|child| child != child_id);
        }
    }

    /// Fail the next `times` calls to `get` with `error`.
    pub fn fail_get(&self, error: StoreError, times: usize) {
        self.lock().get_failure = Some(ScriptedFailure {
            error,
            remaining: times,
        });
    }

    /// Fail the next `times` calls to `add_link` with `error`.
    pub fn fail_add_link(&self, error: StoreError, times: usize) {
        self.lock().add_failure = Some(ScriptedFailure {
            error,
            remaining: times,
        });
    }

    /// Fail the next `times` calls to `remove_link` with `error`.
    pub fn fail_remove_link(&self, error: StoreError, times: usize) {
        self.lock().remove_failure = Some(ScriptedFailure {
            error,
            remaining: times,
        });
    }

    /// Number of `get` calls so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `add_link` calls so far.
    pub fn add_link_calls(&self) -> usize {
        self.add_link_calls.load(Ordering::SeqCst)
    }

    /// Number of `remove_link` calls so far.
    pub fn remove_link_calls(&self) -> usize {
        self.remove_link_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(kind: LinkKind, id: &str) -> StoreError {
    StoreError::status(404, format!("{} {} not found", kind.parent_entity(), id))
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, kind: LinkKind, parent_id: &str) -> Result<ParentEntity, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(error) = ScriptedFailure::take(&mut state.get_failure) {
            return Err(error);
        }
        state
            .parents
            .get(&(kind, parent_id.to_string()))
            .map(|children| ParentEntity::new(parent_id, children.iter().cloned()))
            .ok_or_else(|| not_found(kind, parent_id))
    }

    async fn add_link(&self, kind: LinkKind, link: &Relationship) -> Result<(), StoreError> {
        self.add_link_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(error) = ScriptedFailure::take(&mut state.add_failure) {
            return Err(error);
        }
        let children = state
            .parents
            .get_mut(&(kind, link.parent_id.clone()))
            .ok_or_else(|| not_found(kind, &link.parent_id))?;
        if !children.contains(&link.child_id) {
            children.push(link.child_id.clone());
        }
        Ok(())
    }

    async fn remove_link(&self, kind: LinkKind, link: &Relationship) -> Result<(), StoreError> {
        self.remove_link_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(error) = ScriptedFailure::take(&mut state.remove_failure) {
            return Err(error);
        }
        let children = state
            .parents
            .get_mut(&(kind, link.parent_id.clone()))
            .ok_or_else(|| not_found(kind, &link.parent_id))?;
        let before = children.len();
        children.retain(|child| *child != link.child_id);
        if children.len() == before {
            return Err(StoreError::status(
                404,
                format!("{} {} is not linked", kind.child_entity(), link.child_id),
            ));
        }
        Ok(())
    }
}

// =========================================================================
// Provider harness
// =========================================================================

/// A test harness for provider implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate provider configuration, failing on error diagnostics.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on error diagnostics.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration, failing on error diagnostics.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan a change to an existing resource.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Run plan → create → read and return the refreshed state.
    ///
    /// Fails with [`ProviderError::NotFound`] if the read no longer sees the
    /// resource it just created.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} vanished after create", resource_type)))
    }

    /// Run plan → delete.
    ///
    /// Fails with [`ProviderError::Validation`] without deleting anything if
    /// the plan does not destroy the resource.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let plan = self.plan_delete(resource_type, current_state.clone()).await?;
        if !plan.is_destroy() {
            return Err(ProviderError::Validation(format!(
                "plan for {} does not destroy the resource",
                resource_type
            )));
        }
        self.delete(resource_type, current_state).await
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan destroys the resource.
///
/// # Panics
///
/// Panics if the plan keeps a planned state or has no changes.
pub fn assert_plan_destroys(plan: &PlanResult) {
    assert!(
        plan.is_destroy(),
        "Expected plan to destroy, got planned state {}",
        plan.planned_state
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
