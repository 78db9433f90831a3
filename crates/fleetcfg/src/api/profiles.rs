//! Profile endpoints (v2)

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
use serde::Deserialize;
use tracing::{debug, info, instrument};
use utoipa::IntoParams;
use uuid::Uuid;

use fleetcfg_api::Profile;
use fleetcfg_api::requests::CreateProfileRequest;
use fleetcfg_api::responses::ProfileList;
use fleetcfg_core::reconcile;

use crate::api::error::{ApiError, AppError};
use crate::api::identity::Identity;
use crate::state::AppState;

/// Content type of rendered playbooks
pub const YAML_CONTENT_TYPE: &str = "text/x-yaml";

/// Path segment naming the caller's current profile
pub const CURRENT: &str = "current";

/// Paging and ordering of list endpoints
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page size, 0 or absent for all rows
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// `column[,column][:asc|desc]`
    #[serde(default)]
    pub sort_by: Option<String>,
}

impl PageQuery {
    /// Order clause, newest first unless asked otherwise
    pub fn order_by(&self) -> &str {
        self.sort_by.as_deref().unwrap_or("created_at:desc")
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlaybookQuery {
    pub profile_id: Option<String>,
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request(format!("invalid profile id: {raw}")))
}

/// Profile by id, hidden from other organizations
pub(crate) async fn owned_profile(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> Result<Profile, AppError> {
    let profile = state.store.get(id).await?;
    if profile.org_id != identity.org_id {
        debug!(%id, org_id = %identity.org_id, "profile belongs to another organization");
        return Err(AppError::not_found(format!("profile {id} not found")));
    }
    Ok(profile)
}

/// List the caller's profiles
///
/// # Errors
/// Returns `AppError` on an invalid sort order or a store failure
#[utoipa::path(
    get,
    path = "/profiles",
    tag = "profiles",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of profiles", body = ProfileList),
        (status = 400, description = "Invalid query", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ProfileList>, AppError> {
    let Query(query) = query?;

    let total = state.store.count(&identity.org_id).await?;
    let results = state
        .store
        .list(&identity.org_id, query.order_by(), query.limit, query.offset)
        .await?;

    Ok(Json(ProfileList {
        count: results.len(),
        limit: query.limit,
        offset: query.offset,
        total,
        results,
    }))
}

/// Get one profile; `current` yields the latest, creating a default one
///
/// # Errors
/// Returns `AppError` if the id is invalid or unknown
#[utoipa::path(
    get,
    path = "/profiles/{id}",
    tag = "profiles",
    params(("id" = String, Path, description = "Profile id or `current`")),
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 404, description = "Unknown profile", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    let profile = if id == CURRENT {
        state.current_profile(&identity).await?
    } else {
        owned_profile(&state, &identity, parse_id(&id)?).await?
    };
    Ok(Json(profile))
}

/// Create a new profile version from the current one
///
/// Absent fields keep their current value. Settings identical to the
/// current profile return it unchanged with 200.
///
/// # Errors
/// Returns `AppError` on an invalid body, a policy violation or a store failure
#[utoipa::path(
    post,
    path = "/profiles",
    tag = "profiles",
    request_body = CreateProfileRequest,
    responses(
        (status = 200, description = "Settings unchanged", body = Profile),
        (status = 201, description = "Profile created", body = Profile),
        (status = 400, description = "Invalid request", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;
    let current = state.current_profile(&identity).await?;

    let mut profile = current.copy();
    profile.creator = identity.username.clone();
    if let Some(name) = request.name {
        profile.name = Some(name);
    }
    if let Some(label) = request.label {
        profile.label = Some(label);
    }
    profile.active = request.active.unwrap_or(profile.active);
    profile.insights = request.insights.unwrap_or(profile.insights);
    profile.remediations = request.remediations.unwrap_or(profile.remediations);
    profile.compliance = request.compliance.unwrap_or(profile.compliance);

    reconcile(&current.state_config(), &profile.state_config())?;

    if profile.same_settings(&current) {
        info!(profile_id = %current.id, "requested settings match current profile");
        return Ok((StatusCode::OK, Json(current)));
    }

    state.commit(&profile, &identity).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Render the playbook of a profile
///
/// # Errors
/// Returns `AppError` if `profile_id` is missing or unknown, or compilation fails
#[utoipa::path(
    get,
    path = "/playbooks",
    tag = "playbooks",
    params(PlaybookQuery),
    responses(
        (status = 200, description = "Playbook", body = String, content_type = "text/x-yaml"),
        (status = 400, description = "Missing profile_id", body = ApiError),
    )
)]
#[instrument(skip_all, fields(org_id = %identity.org_id))]
pub async fn get_playbook(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: Result<Query<PlaybookQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let raw = query
        .profile_id
        .ok_or_else(|| AppError::bad_request("missing profile_id query parameter"))?;

    let profile = owned_profile(&state, &identity, parse_id(&raw)?).await?;
    let playbook = state.compiler.compile(&profile.state_config())?;

    Ok(([(header::CONTENT_TYPE, YAML_CONTENT_TYPE)], playbook))
}
