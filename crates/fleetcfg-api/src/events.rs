//! Message-queue payloads
//!
//! Consumed: dispatcher run results and inventory host events.
//! Published: inventory updates recording the applied profile.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::host::Host;

/// Run label carrying the dispatched profile id
pub const LABEL_STATE_ID: &str = "state_id";
/// Run label carrying the inventory host id
pub const LABEL_HOST_ID: &str = "id";

/// Run lifecycle event published by the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherEvent {
    #[serde(default)]
    pub event_type: String,
    pub payload: DispatcherEventPayload,
}

/// Run details inside a [`DispatcherEvent`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherEventPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// `success`, `running`, `failure`, `timeout`, ...
    pub status: String,
}

/// Host created/updated event from the inventory service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub host: Host,
}

/// System-profile patch sent back to the inventory service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub operation: String,
    pub platform_metadata: PlatformMetadata,
    pub data: InventoryUpdateData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMetadata {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdateData {
    pub id: String,
    pub org_id: String,
    pub system_profile: AppliedState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedState {
    pub rhc_config_state: String,
}
