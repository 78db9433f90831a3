//! Response types for the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::profile::{Profile, StateMap};

/// One page of profiles
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileList {
    /// Number of results in this page
    pub count: usize,
    pub limit: i64,
    pub offset: i64,
    /// Number of profiles stored for the organization
    pub total: i64,
    pub results: Vec<Profile>,
}

/// Current state of an organization, v1 shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountState {
    pub account: String,
    #[schema(value_type = Object)]
    pub state: StateMap,
    pub id: Uuid,
    pub label: String,
    /// Whether the state is applied to hosts
    pub apply_state: bool,
    pub org_id: String,
}

impl From<&Profile> for AccountState {
    fn from(profile: &Profile) -> Self {
        Self {
            account: profile.account_id.clone().unwrap_or_default(),
            state: profile.state_config(),
            id: profile.id,
            label: profile.label.clone().unwrap_or_default(),
            apply_state: profile.active,
            org_id: profile.org_id.clone(),
        }
    }
}

/// One historical state change, v1 shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StateArchive {
    pub account: String,
    pub id: Uuid,
    pub label: String,
    /// Who made the change
    pub initiator: String,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub state: StateMap,
    pub org_id: String,
}

impl From<&Profile> for StateArchive {
    fn from(profile: &Profile) -> Self {
        Self {
            account: profile.account_id.clone().unwrap_or_default(),
            id: profile.id,
            label: profile.label.clone().unwrap_or_default(),
            initiator: profile.creator.clone().unwrap_or_default(),
            created_at: profile.created_at,
            state: profile.state_config(),
            org_id: profile.org_id.clone(),
        }
    }
}

/// One page of state changes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StateList {
    pub count: usize,
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub results: Vec<StateArchive>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
