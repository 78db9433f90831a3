//! `OpenAPI` documents, one per API version
//!
//! Paths are relative to the version base, e.g. `/api/config-manager/v2`.

use utoipa::OpenApi;

/// Profile API (v2)
#[derive(OpenApi)]
#[openapi(
    info(title = "fleetcfg API", version = "2.0.0"),
    paths(
        crate::api::profiles::list_profiles,
        crate::api::profiles::get_profile,
        crate::api::profiles::create_profile,
        crate::api::profiles::get_playbook,
        crate::api::system::openapi_v2,
    ),
    components(schemas(
        fleetcfg_api::Profile,
        fleetcfg_api::requests::CreateProfileRequest,
        fleetcfg_api::responses::ProfileList,
        crate::api::error::ApiError,
    )),
    tags(
        (name = "profiles", description = "Versioned configuration profiles"),
        (name = "playbooks", description = "Rendered playbooks"),
    )
)]
pub struct V2Doc;

/// State API (v1)
#[derive(OpenApi)]
#[openapi(
    info(title = "fleetcfg API", version = "1.0.0"),
    paths(
        crate::api::states::update_states,
        crate::api::states::list_states,
        crate::api::states::current_state,
        crate::api::states::get_state,
        crate::api::states::state_playbook,
        crate::api::states::preview_playbook,
        crate::api::states::manage,
        crate::api::system::openapi_v1,
    ),
    components(schemas(
        fleetcfg_api::responses::AccountState,
        fleetcfg_api::responses::StateArchive,
        fleetcfg_api::responses::StateList,
        crate::api::error::ApiError,
    )),
    tags((name = "states", description = "Account states"))
)]
pub struct V1Doc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_document_lists_profile_routes() {
        let doc = V2Doc::openapi();

        for path in ["/profiles", "/profiles/{id}", "/playbooks", "/openapi.json"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemas = doc.components.unwrap().schemas;
        assert!(schemas.contains_key("Profile"));
        assert!(schemas.contains_key("ProfileList"));
    }

    #[test]
    fn test_v1_document_lists_state_routes() {
        let doc = V1Doc::openapi();

        for path in [
            "/states",
            "/states/current",
            "/states/{id}",
            "/states/{id}/playbook",
            "/states/preview",
            "/manage",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
