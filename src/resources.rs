//! Association resources and their typed state.
//!
//! Each resource links a child entity to a parent entity. Resource state is
//! handled as a strongly typed struct everywhere inside the provider and is
//! only turned into a generic [`serde_json::Value`] at the orchestrator
//! boundary, through [`from_state`] and [`to_state`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::id::Relationship;
use crate::schema::{Attribute, Schema};

/// The association families this provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// A user's membership of a team.
    TeamMembership,
    /// An automation action made available to a team.
    ActionTeam,
    /// An automation action attached to a service.
    ActionService,
    /// An automation actions runner shared with a team.
    RunnerTeam,
}

impl LinkKind {
    /// Every kind, in registration order.
    pub const ALL: [LinkKind; 4] = [
        LinkKind::TeamMembership,
        LinkKind::ActionTeam,
        LinkKind::ActionService,
        LinkKind::RunnerTeam,
    ];

    /// The resource type name exposed to configurations.
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::TeamMembership => "pagerduty_team_membership",
            Self::ActionTeam => "pagerduty_automation_actions_action_team_association",
            Self::ActionService => "pagerduty_automation_actions_action_service_association",
            Self::RunnerTeam => "pagerduty_automation_actions_runner_team_association",
        }
    }

    /// Look up a kind by resource type name.
    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.resource_type() == resource_type)
    }

    /// Entity that owns the membership list.
    pub fn parent_entity(self) -> &'static str {
        match self {
            Self::TeamMembership | Self::ActionTeam | Self::RunnerTeam => "team",
            Self::ActionService => "service",
        }
    }

    /// Entity that is listed as a member.
    pub fn child_entity(self) -> &'static str {
        match self {
            Self::TeamMembership => "user",
            Self::ActionTeam | Self::ActionService => "action",
            Self::RunnerTeam => "runner",
        }
    }

    /// State attribute holding the parent ID.
    pub fn parent_attribute(self) -> &'static str {
        match self {
            Self::TeamMembership | Self::ActionTeam | Self::RunnerTeam => "team_id",
            Self::ActionService => "service_id",
        }
    }

    /// State attribute holding the child ID.
    pub fn child_attribute(self) -> &'static str {
        match self {
            Self::TeamMembership => "user_id",
            Self::ActionTeam | Self::ActionService => "action_id",
            Self::RunnerTeam => "runner_id",
        }
    }

    /// Resource schema: both IDs are required and force replacement.
    pub fn schema(self) -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(format!(
                    "'{}:{}'",
                    self.child_attribute(),
                    self.parent_attribute()
                )),
            )
            .with_attribute(
                self.parent_attribute(),
                Attribute::required_string()
                    .with_description(format!("ID of the {}", self.parent_entity()))
                    .with_force_new(),
            )
            .with_attribute(
                self.child_attribute(),
                Attribute::required_string()
                    .with_description(format!("ID of the {}", self.child_entity()))
                    .with_force_new(),
            )
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resource_type())
    }
}

/// Typed state of an association resource.
pub trait LinkResource: Serialize + DeserializeOwned + Send + Sync {
    /// The association family this struct describes.
    const KIND: LinkKind;

    /// The compound ID recorded in state, if any.
    fn id(&self) -> Option<&str>;

    /// The link this state refers to.
    fn relationship(&self) -> Relationship;

    /// Build state for a link, with its compound ID filled in.
    fn from_relationship(link: &Relationship) -> Self;
}

/// Decode generic resource state into its typed form.
pub fn from_state<R: LinkResource>(state: Value) -> Result<R, ProviderError> {
    serde_json::from_value(state).map_err(|err| {
        ProviderError::Validation(format!("invalid {} state: {}", R::KIND, err))
    })
}

/// Encode typed resource state for the orchestrator.
pub fn to_state<R: LinkResource>(resource: &R) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(resource)?)
}

/// `pagerduty_team_membership`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    /// Compound ID, `user_id:team_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The user.
    pub user_id: String,
    /// The team.
    pub team_id: String,
}

impl LinkResource for TeamMembership {
    const KIND: LinkKind = LinkKind::TeamMembership;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn relationship(&self) -> Relationship {
        Relationship::new(&self.team_id, &self.user_id)
    }

    fn from_relationship(link: &Relationship) -> Self {
        Self {
            id: Some(link.id()),
            user_id: link.child_id.clone(),
            team_id: link.parent_id.clone(),
        }
    }
}

/// `pagerduty_automation_actions_action_team_association`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTeamAssociation {
    /// Compound ID, `action_id:team_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The automation action.
    pub action_id: String,
    /// The team.
    pub team_id: String,
}

impl LinkResource for ActionTeamAssociation {
    const KIND: LinkKind = LinkKind::ActionTeam;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn relationship(&self) -> Relationship {
        Relationship::new(&self.team_id, &self.action_id)
    }

    fn from_relationship(link: &Relationship) -> Self {
        Self {
            id: Some(link.id()),
            action_id: link.child_id.clone(),
            team_id: link.parent_id.clone(),
        }
    }
}

/// `pagerduty_automation_actions_action_service_association`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionServiceAssociation {
    /// Compound ID, `action_id:service_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The automation action.
    pub action_id: String,
    /// The service.
    pub service_id: String,
}

impl LinkResource for ActionServiceAssociation {
    const KIND: LinkKind = LinkKind::ActionService;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn relationship(&self) -> Relationship {
        Relationship::new(&self.service_id, &self.action_id)
    }

    fn from_relationship(link: &Relationship) -> Self {
        Self {
            id: Some(link.id()),
            action_id: link.child_id.clone(),
            service_id: link.parent_id.clone(),
        }
    }
}

/// `pagerduty_automation_actions_runner_team_association`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerTeamAssociation {
    /// Compound ID, `runner_id:team_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The automation actions runner.
    pub runner_id: String,
    /// The team.
    pub team_id: String,
}

impl LinkResource for RunnerTeamAssociation {
    const KIND: LinkKind = LinkKind::RunnerTeam;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn relationship(&self) -> Relationship {
        Relationship::new(&self.team_id, &self.runner_id)
    }

    fn from_relationship(link: &Relationship) -> Self {
        Self {
            id: Some(link.id()),
            runner_id: link.child_id.clone(),
            team_id: link.parent_id.clone(),
        }
    }
}
