//! State endpoints (v1)
//!
//! The v1 surface views profiles as account states: a state map plus an
//! `apply_state` flag.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, instrument};

use fleetcfg_api::StateMap;
use fleetcfg_api::responses::{AccountState, StateArchive, StateList};
use fleetcfg_core::reconcile;

use crate::api::error::{ApiError, AppError};
use crate::api::identity::Identity;
use crate::api::profiles::{PageQuery, owned_profile, parse_id};
use crate::state::AppState;

/// Apply a new state map to the caller's organization
///
/// # Errors
/// Returns `AppError` on an invalid body, a policy violation or a store failure
#[utoipa::path(
    post,
    path = "/states",
    tag = "states",
    request_body = Object,
    responses(
        (status = 200, description = "Resulting state", body = AccountState),
        (status = 400, description = "Invalid state", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn update_states(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Result<Json<StateMap>, JsonRejection>,
) -> Result<Json<AccountState>, AppError> {
    let Json(requested) = body?;
    let current = state.current_profile(&identity).await?;

    if reconcile(&current.state_config(), &requested)?.is_noop() {
        info!(profile_id = %current.id, "requested state matches current state");
        return Ok(Json(AccountState::from(&current)));
    }

    let mut profile = current.copy();
    profile.set_state_config(&requested);
    profile.creator = identity.username.clone();
    state.commit(&profile, &identity).await?;

    Ok(Json(AccountState::from(&profile)))
}

/// List state changes of the caller's organization
///
/// # Errors
/// Returns `AppError` on an invalid sort order or a store failure
#[utoipa::path(
    get,
    path = "/states",
    tag = "states",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of state changes", body = StateList),
        (status = 400, description = "Invalid query", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn list_states(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<StateList>, AppError> {
    let Query(query) = query?;

    let total = state.store.count(&identity.org_id).await?;
    let results: Vec<StateArchive> = state
        .store
        .list(&identity.org_id, query.order_by(), query.limit, query.offset)
        .await?
        .iter()
        .map(StateArchive::from)
        .collect();

    Ok(Json(StateList {
        count: results.len(),
        limit: query.limit,
        offset: query.offset,
        total,
        results,
    }))
}

/// Current state, creating the default one for a new organization
///
/// # Errors
/// Returns `AppError` if the store fails
#[utoipa::path(
    get,
    path = "/states/current",
    tag = "states",
    responses((status = 200, description = "Current state", body = AccountState))
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn current_state(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<AccountState>, AppError> {
    let profile = state.current_profile(&identity).await?;
    Ok(Json(AccountState::from(&profile)))
}

/// One state change
///
/// # Errors
/// Returns `AppError` if the id is invalid or unknown
#[utoipa::path(
    get,
    path = "/states/{id}",
    tag = "states",
    params(("id" = uuid::Uuid, Path, description = "State id")),
    responses(
        (status = 200, description = "State change", body = StateArchive),
        (status = 404, description = "Unknown state", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<StateArchive>, AppError> {
    let profile = owned_profile(&state, &identity, parse_id(&id)?).await?;
    Ok(Json(StateArchive::from(&profile)))
}

/// Playbook of one state change
///
/// # Errors
/// Returns `AppError` if the id is unknown or compilation fails
#[utoipa::path(
    get,
    path = "/states/{id}/playbook",
    tag = "states",
    params(("id" = uuid::Uuid, Path, description = "State id")),
    responses((status = 200, description = "Playbook", body = String, content_type = "text/plain"))
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn state_playbook(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = owned_profile(&state, &identity, parse_id(&id)?).await?;
    let playbook = state.compiler.compile(&profile.state_config())?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], playbook))
}

/// Render a playbook for an arbitrary state map without storing anything
///
/// # Errors
/// Returns `AppError` on an invalid body or an unknown state value
#[utoipa::path(
    post,
    path = "/states/preview",
    tag = "states",
    request_body = Object,
    responses(
        (status = 200, description = "Playbook", body = String, content_type = "text/plain"),
        (status = 400, description = "Invalid state", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn preview_playbook(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Result<Json<StateMap>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(requested) = body?;
    let playbook = state.compiler.compile(&requested)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], playbook))
}

/// Turn automatic convergence on or off, keeping the service flags
///
/// # Errors
/// Returns `AppError` on an invalid body or a store failure
#[utoipa::path(
    post,
    path = "/manage",
    tag = "states",
    request_body = bool,
    responses((status = 200, description = "Apply state updated"))
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn manage(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Result<Json<bool>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(enabled) = body?;
    info!(org_id = %identity.org_id, apply_state = enabled, "setting apply state");

    let current = state.current_profile(&identity).await?;
    if current.active == enabled {
        return Ok(StatusCode::OK);
    }

    let mut profile = current.copy();
    profile.active = enabled;
    profile.creator = identity.username.clone();
    state.commit(&profile, &identity).await?;

    Ok(StatusCode::OK)
}
