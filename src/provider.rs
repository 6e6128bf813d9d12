//! The PagerDuty association provider.
//!
//! Implements [`ProviderService`] for every [`LinkKind`]. Generic JSON state
//! is converted to the resource's typed struct on entry and back on exit;
//! the link itself is driven by [`LinkLifecycle`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::id::SEPARATOR;
use crate::lifecycle::LinkLifecycle;
use crate::resources::{
    from_state, to_state, ActionServiceAssociation, ActionTeamAssociation, LinkKind, LinkResource,
    RunnerTeamAssociation, TeamMembership,
};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::store::EntityStore;
use crate::types::{AttributeChange, ImportedResource, PlanResult};
use crate::validation::validate;

/// Run `$body` with `$r` aliased to the typed state struct for `$resource_type`.
macro_rules! with_resource {
    ($resource_type:expr, $r:ident => $body:expr) => {
        match LinkKind::from_resource_type($resource_type) {
            Some(LinkKind::TeamMembership) => {
                type $r = TeamMembership;
                $body
            },
            Some(LinkKind::ActionTeam) => {
                type $r = ActionTeamAssociation;
                $body
            },
            Some(LinkKind::ActionService) => {
                type $r = ActionServiceAssociation;
                $body
            },
            Some(LinkKind::RunnerTeam) => {
                type $r = RunnerTeamAssociation;
                $body
            },
            None => Err(ProviderError::UnknownResource($resource_type.to_string())),
        }
    };
}

/// Provider for PagerDuty association resources, backed by an [`EntityStore`].
pub struct PagerDutyProvider<S: EntityStore> {
    store: Arc<S>,
    config: RwLock<ProviderConfig>,
}

impl<S: EntityStore> PagerDutyProvider<S> {
    /// Create a provider with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, ProviderConfig::default())
    }

    /// Create a provider with an explicit configuration.
    pub fn with_config(store: S, config: ProviderConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: RwLock::new(config),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// A snapshot of the current configuration.
    pub async fn config(&self) -> ProviderConfig {
        self.config.read().await.clone()
    }

    async fn lifecycle(&self) -> LinkLifecycle<S> {
        let policy = self.config.read().await.create_retry_policy();
        LinkLifecycle::new(Arc::clone(&self.store), policy)
    }

    fn plan_link<R: LinkResource>(
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        let proposed: R = from_state(proposed_state)?;
        let planned = to_state(&R::from_relationship(&proposed.relationship()))?;

        let prior = match prior_state {
            None | Some(Value::Null) => {
                let changes = attribute_names(&planned)
                    .map(|name| AttributeChange::added(name, planned[name].clone()))
                    .collect();
                return Ok(PlanResult::with_changes(planned, changes, false));
            },
            Some(prior) => {
                let prior: R = from_state(prior)?;
                to_state(&R::from_relationship(&prior.relationship()))?
            },
        };

        let changes: Vec<AttributeChange> = attribute_names(&planned)
            .filter(|name| prior.get(*name) != planned.get(*name))
            .map(|name| {
                AttributeChange::modified(name, prior[name].clone(), planned[name].clone())
            })
            .collect();

        if changes.is_empty() {
            return Ok(PlanResult::no_change(prior));
        }

        let schema = R::KIND.schema();
        let requires_replace = schema
            .force_new_attributes()
            .any(|name| changes.iter().any(|change| change.path == name));
        Ok(PlanResult::with_changes(planned, changes, requires_replace))
    }

    async fn create_link<R: LinkResource>(
        &self,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource: R = from_state(planned_state)?;
        let link = resource.relationship();
        self.lifecycle().await.create(R::KIND, &link).await?;
        to_state(&R::from_relationship(&link))
    }

    async fn read_link<R: LinkResource>(
        &self,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource: R = from_state(current_state)?;
        let id = state_id(&resource)?;
        match self.lifecycle().await.read(R::KIND, &id).await? {
            Some(link) => Ok(Some(to_state(&R::from_relationship(&link))?)),
            None => Ok(None),
        }
    }

    fn update_link<R: LinkResource>(
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let prior: R = from_state(prior_state)?;
        let planned: R = from_state(planned_state)?;
        if prior.relationship() != planned.relationship() {
            return Err(ProviderError::RequiresReplace(format!(
                "{} links cannot be changed in place",
                R::KIND
            )));
        }
        to_state(&R::from_relationship(&prior.relationship()))
    }

    async fn delete_link<R: LinkResource>(
        &self,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let resource: R = from_state(current_state)?;
        let id = state_id(&resource)?;
        self.lifecycle().await.delete(R::KIND, &id).await
    }

    async fn import_link<R: LinkResource>(
        &self,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        match self.lifecycle().await.read(R::KIND, id).await? {
            Some(link) => Ok(vec![ImportedResource::new(
                R::KIND.resource_type(),
                to_state(&R::from_relationship(&link))?,
            )]),
            None => Err(ProviderError::NotFound(format!("{} {}", R::KIND, id))),
        }
    }
}

/// The compound ID recorded in state.
fn state_id<R: LinkResource>(resource: &R) -> Result<String, ProviderError> {
    resource
        .id()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::MalformedIdentifier(format!("{} state has no id", R::KIND)))
}

fn invalid_config(err: &ProviderError) -> Diagnostic {
    Diagnostic::error("Invalid provider configuration").with_detail(err.message())
}

fn attribute_names(state: &Value) -> impl Iterator<Item = &str> {
    state
        .as_object()
        .into_iter()
        .flat_map(|obj| obj.keys().map(String::as_str))
}

fn destroy_plan(prior_state: Option<Value>) -> PlanResult {
    match prior_state {
        Some(Value::Object(prior)) => {
            let changes = prior
                .into_iter()
                .map(|(name, value)| AttributeChange::removed(name, value))
                .collect();
            PlanResult::with_changes(Value::Null, changes, false)
        },
        _ => PlanResult::no_change(Value::Null),
    }
}

#[async_trait::async_trait]
impl<S: EntityStore> ProviderService for PagerDutyProvider<S> {
    fn schema(&self) -> ProviderSchema {
        LinkKind::ALL.into_iter().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, kind| schema.with_resource(kind.resource_type(), kind.schema()),
        )
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&ProviderConfig::schema(), &config);
        if diagnostics.is_empty() {
            match ProviderConfig::from_value(config) {
                Ok(parsed) => diagnostics.extend(parsed.validate()),
                Err(err) => diagnostics.push(invalid_config(&err)),
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let parsed = match ProviderConfig::from_value(config) {
            Ok(parsed) => parsed,
            Err(err) => return Ok(vec![invalid_config(&err)]),
        };

        let diagnostics = parsed.validate();
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        info!(
            create_timeout_secs = parsed.create_timeout_secs,
            "Provider configured"
        );
        *self.config.write().await = parsed;
        Ok(diagnostics)
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let kind = LinkKind::from_resource_type(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;

        let mut diagnostics = validate(&kind.schema(), &config);
        for attribute in [kind.parent_attribute(), kind.child_attribute()] {
            let Some(value) = config.get(attribute).and_then(Value::as_str) else {
                continue;
            };
            if value.is_empty() {
                diagnostics.push(
                    Diagnostic::error(format!("Attribute '{}' must not be empty", attribute))
                        .with_attribute(attribute),
                );
            } else if value.contains(SEPARATOR) {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Attribute '{}' contains '{}'",
                        attribute, SEPARATOR
                    ))
                    .with_detail("IDs containing the separator cannot be encoded in the resource ID")
                    .with_attribute(attribute),
                );
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        debug!("Plan called");
        if proposed_state.is_null() {
            LinkKind::from_resource_type(resource_type)
                .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
            return Ok(destroy_plan(prior_state));
        }
        with_resource!(resource_type, R => Self::plan_link::<R>(prior_state, proposed_state))
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        debug!("Create called");
        with_resource!(resource_type, R => self.create_link::<R>(planned_state).await)
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        debug!("Read called");
        with_resource!(resource_type, R => self.read_link::<R>(current_state).await)
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        debug!("Update called");
        with_resource!(resource_type, R => Self::update_link::<R>(prior_state, planned_state))
    }

    #[instrument(skip(self, current_state))]
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        debug!("Delete called");
        with_resource!(resource_type, R => self.delete_link::<R>(current_state).await)
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        debug!("Import called");
        with_resource!(resource_type, R => self.import_link::<R>(id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::testing::{
        assert_error_contains, assert_has_errors, assert_no_errors, assert_plan_creates,
        assert_plan_destroys, assert_plan_no_changes, assert_plan_replaces, MemoryStore,
        ProviderTester,
    };
    use serde_json::json;

    const MEMBERSHIP: &str = "pagerduty_team_membership";

    fn tester(store: MemoryStore) -> ProviderTester<PagerDutyProvider<MemoryStore>> {
        ProviderTester::new(PagerDutyProvider::new(store))
    }

    fn team_store(children: &[&str]) -> MemoryStore {
        MemoryStore::new().with_parent(LinkKind::TeamMembership, "team_456", children.iter().copied())
    }

    #[tokio::test]
    async fn test_schema_lists_all_resources() {
        let tester = tester(MemoryStore::new());
        let types = tester.resource_types();
        assert_eq!(types.len(), 4);
        assert!(types.contains(&MEMBERSHIP.to_string()));
        assert!(types.contains(&"pagerduty_automation_actions_runner_team_association".to_string()));
        assert!(tester.schema().provider.attributes.contains_key("create_timeout_secs"));
    }

    #[tokio::test]
    async fn test_configure() {
        let tester = tester(MemoryStore::new());
        tester
            .configure(json!({"create_timeout_secs": 30}))
            .await
            .unwrap();
        assert_eq!(tester.provider().config().await.create_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_backoff() {
        let tester = tester(MemoryStore::new());
        let err = tester
            .configure(json!({"retry_min_backoff_ms": 5000, "retry_max_backoff_ms": 10}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("below the minimum"));
        assert_eq!(tester.provider().config().await, ProviderConfig::default());
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let tester = tester(MemoryStore::new());
        assert!(tester.validate_provider_config(json!({})).await.is_ok());

        let diagnostics = tester
            .provider()
            .validate_provider_config(json!({"create_timeout_secs": "soon"}))
            .await
            .unwrap();
        assert_has_errors(&diagnostics);
    }

    #[tokio::test]
    async fn test_provider_config_parse_failure_is_a_diagnostic() {
        let provider = PagerDutyProvider::new(MemoryStore::new());
        let config = json!({"create_timeout_secs": -1});

        let diagnostics = provider
            .validate_provider_config(config.clone())
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "Invalid provider configuration");

        let diagnostics = provider.configure(config).await.unwrap();
        assert_error_contains(&diagnostics, "Invalid provider configuration");
        assert_eq!(provider.config().await, ProviderConfig::default());
    }

    #[tokio::test]
    async fn test_oversized_timeout_rejected() {
        let tester = tester(team_store(&[]));
        let config = json!({"create_timeout_secs": i64::MAX});

        assert!(tester.validate_provider_config(config.clone()).await.is_err());
        let err = tester.configure(config).await.unwrap_err();
        assert!(err.to_string().contains("too long"));
        assert_eq!(tester.provider().config().await, ProviderConfig::default());

        tester
            .create(MEMBERSHIP, json!({"user_id": "user_123", "team_id": "team_456"}))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_with_unrepresentable_timeout() {
        let store = team_store(&[]);
        store.fail_add_link(StoreError::status(500, "Internal Server Error"), 1);
        let config = ProviderConfig {
            create_timeout_secs: u64::MAX,
            ..ProviderConfig::default()
        };
        let tester = ProviderTester::new(PagerDutyProvider::with_config(store, config));

        let state = tester
            .create(MEMBERSHIP, json!({"user_id": "user_123", "team_id": "team_456"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "user_123:team_456");
        assert_eq!(tester.provider().store().add_link_calls(), 2);
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let provider = PagerDutyProvider::new(MemoryStore::new());

        let diagnostics = provider
            .validate_resource_config(MEMBERSHIP, json!({"user_id": "user_123", "team_id": "team_456"}))
            .await
            .unwrap();
        assert_no_errors(&diagnostics);

        let diagnostics = provider
            .validate_resource_config(MEMBERSHIP, json!({"user_id": "a:b", "team_id": ""}))
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "'user_id' contains ':'");
        assert_error_contains(&diagnostics, "'team_id' must not be empty");

        let err = provider
            .validate_resource_config("pagerduty_team", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_plan_create_computes_id() {
        let tester = tester(MemoryStore::new());
        let plan = tester
            .plan_create(MEMBERSHIP, json!({"user_id": "user_123", "team_id": "team_456"}))
            .await
            .unwrap();

        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["id"], "user_123:team_456");
    }

    #[tokio::test]
    async fn test_plan_changing_team_replaces() {
        let tester = tester(MemoryStore::new());
        let prior = json!({"id": "user_123:team_456", "user_id": "user_123", "team_id": "team_456"});
        let plan = tester
            .plan_update(MEMBERSHIP, prior, json!({"user_id": "user_123", "team_id": "team_789"}))
            .await
            .unwrap();

        assert_plan_replaces(&plan);
        assert_eq!(plan.planned_state["id"], "user_123:team_789");
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert!(paths.contains(&"team_id"));
        assert!(paths.contains(&"id"));
        assert!(!paths.contains(&"user_id"));
    }

    #[tokio::test]
    async fn test_plan_unchanged() {
        let tester = tester(MemoryStore::new());
        let prior = json!({"id": "user_123:team_456", "user_id": "user_123", "team_id": "team_456"});
        let plan = tester
            .plan_update(MEMBERSHIP, prior.clone(), json!({"user_id": "user_123", "team_id": "team_456"}))
            .await
            .unwrap();

        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state, prior);
    }

    #[tokio::test]
    async fn test_plan_delete() {
        let tester = tester(MemoryStore::new());
        let prior = json!({"id": "user_123:team_456", "user_id": "user_123", "team_id": "team_456"});
        let plan = tester.plan_delete(MEMBERSHIP, prior).await.unwrap();
        assert_plan_destroys(&plan);
        assert_eq!(plan.changes.len(), 3);
    }

    #[tokio::test]
    async fn test_membership_drift_scenario() {
        let tester = tester(team_store(&["user_999"]));

        let state = tester
            .lifecycle_create(MEMBERSHIP, json!({"user_id": "user_123", "team_id": "team_456"}))
            .await
            .unwrap();
        assert_eq!(
            state,
            json!({"id": "user_123:team_456", "user_id": "user_123", "team_id": "team_456"})
        );

        let refreshed = tester.read(MEMBERSHIP, state.clone()).await.unwrap();
        assert_eq!(refreshed, Some(state.clone()));

        // Removed from the team outside of the provider
        tester
            .provider()
            .store()
            .unlink(LinkKind::TeamMembership, "team_456", "user_123");

        let refreshed = tester.read(MEMBERSHIP, state).await.unwrap();
        assert_eq!(refreshed, None);
    }

    #[tokio::test]
    async fn test_read_refreshes_fields_from_id() {
        let tester = tester(team_store(&["user_123"]));
        let state = json!({"id": "user_123:team_456", "user_id": "stale", "team_id": "stale"});

        let refreshed = tester.read(MEMBERSHIP, state).await.unwrap().unwrap();
        assert_eq!(refreshed["user_id"], "user_123");
        assert_eq!(refreshed["team_id"], "team_456");
    }

    #[tokio::test]
    async fn test_read_without_id() {
        let tester = tester(team_store(&["user_123"]));
        let err = tester
            .read(MEMBERSHIP, json!({"user_id": "user_123", "team_id": "team_456"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedIdentifier(_)));
    }

    #[tokio::test]
    async fn test_read_parent_fetch_failure() {
        let store = team_store(&["user_123"]);
        store.fail_get(StoreError::status(500, "Internal Server Error"), 1);
        let tester = tester(store);

        let err = tester
            .read(
                MEMBERSHIP,
                json!({"id": "user_123:team_456", "user_id": "user_123", "team_id": "team_456"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EntityNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_in_place_rejected() {
        let tester = tester(MemoryStore::new());
        let prior = json!({"id": "user_123:team_456", "user_id": "user_123", "team_id": "team_456"});

        let same = tester.update(MEMBERSHIP, prior.clone(), prior.clone()).await.unwrap();
        assert_eq!(same, prior);

        let err = tester
            .update(MEMBERSHIP, prior, json!({"user_id": "user_999", "team_id": "team_456"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequiresReplace(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let tester = tester(team_store(&["user_123", "user_999"]));
        tester
            .lifecycle_delete(
                MEMBERSHIP,
                json!({"id": "user_123:team_456", "user_id": "user_123", "team_id": "team_456"}),
            )
            .await
            .unwrap();

        assert_eq!(
            tester.provider().store().children(LinkKind::TeamMembership, "team_456"),
            vec!["user_999".to_string()]
        );
    }

    #[tokio::test]
    async fn test_import() {
        let tester = tester(team_store(&["user_123"]));

        let imported = tester.import_resource(MEMBERSHIP, "user_123:team_456").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, MEMBERSHIP);
        assert_eq!(imported[0].state["user_id"], "user_123");

        let err = tester.import_resource(MEMBERSHIP, "user_999:team_456").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));

        let err = tester.import_resource(MEMBERSHIP, "user_999").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedIdentifier(_)));
    }

    #[tokio::test]
    async fn test_action_service_association() {
        let store =
            MemoryStore::new().with_parent(LinkKind::ActionService, "PSVC01", Vec::<String>::new());
        let tester = tester(store);
        let resource_type = LinkKind::ActionService.resource_type();

        let state = tester
            .lifecycle_create(resource_type, json!({"action_id": "PACT01", "service_id": "PSVC01"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "PACT01:PSVC01");
        assert_eq!(
            tester.provider().store().children(LinkKind::ActionService, "PSVC01"),
            vec!["PACT01".to_string()]
        );

        tester.lifecycle_delete(resource_type, state.clone()).await.unwrap();
        assert_eq!(tester.read(resource_type, state).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_honors_configured_timeout() {
        let store =
            MemoryStore::new().with_parent(LinkKind::RunnerTeam, "team_456", Vec::<String>::new());
        store.fail_add_link(StoreError::status(502, "Bad Gateway"), usize::MAX);
        let tester = tester(store);
        tester
            .configure(json!({"create_timeout_secs": 5, "retry_max_backoff_ms": 1000}))
            .await
            .unwrap();

        let start = tokio::time::Instant::now();
        let err = tester
            .create(
                LinkKind::RunnerTeam.resource_type(),
                json!({"runner_id": "PRUN01", "team_id": "team_456"}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::LinkCreationFailed { .. }));
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let tester = tester(MemoryStore::new());
        let err = tester.create("pagerduty_team", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }
}
