//! HTTP router configuration

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::{profiles, states, system};
use crate::config::DaemonConfig;
use crate::state::AppState;

/// Create the application router
///
/// Versioned routes are nested under [`DaemonConfig::api_base`].
pub fn create_router(state: Arc<AppState>, daemon: &DaemonConfig) -> Router {
    let v1 = Router::new()
        .route("/states", get(states::list_states).post(states::update_states))
        .route("/states/current", get(states::current_state))
        .route("/states/preview", post(states::preview_playbook))
        .route("/states/{id}", get(states::get_state))
        .route("/states/{id}/playbook", get(states::state_playbook))
        .route("/manage", post(states::manage))
        .route("/openapi.json", get(system::openapi_v1));

    let v2 = Router::new()
        .route(
            "/profiles",
            get(profiles::list_profiles).post(profiles::create_profile),
        )
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/playbooks", get(profiles::get_playbook))
        .route("/openapi.json", get(system::openapi_v2));

    Router::new()
        // System endpoints
        .route("/health", get(system::health))
        .nest(&daemon.api_base("v1"), v1)
        .nest(&daemon.api_base("v2"), v2)
        // State
        .with_state(state)
}
