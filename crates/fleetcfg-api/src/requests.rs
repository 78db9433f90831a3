//! Request types for the API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of a profile creation request; absent fields keep the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<bool>,
}
