//! Application state shared across HTTP handlers

use std::sync::Arc;

use kameo::actor::ActorRef;
use tracing::{info, warn};

use fleetcfg_api::{Profile, StateMap};
use fleetcfg_core::{ApplyProfile, DispatchActor};
use fleetcfg_playbook::PlaybookCompiler;
use fleetcfg_store::ProfileStore;

use crate::api::error::AppError;
use crate::api::identity::Identity;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub compiler: Arc<PlaybookCompiler>,
    /// Receives dispatch requests for newly stored profiles
    pub dispatch: ActorRef<DispatchActor>,
    /// State of the default profile created for new organizations
    pub default_state: Arc<StateMap>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        store: Arc<dyn ProfileStore>,
        compiler: Arc<PlaybookCompiler>,
        dispatch: ActorRef<DispatchActor>,
        default_state: StateMap,
    ) -> Self {
        Self {
            store,
            compiler,
            dispatch,
            default_state: Arc::new(default_state),
        }
    }

    /// Default profile for the caller's organization, not yet persisted
    #[must_use]
    pub fn default_profile(&self, identity: &Identity) -> Profile {
        Profile::new(
            identity.org_id.clone(),
            identity.account_number.clone(),
            &self.default_state,
        )
    }

    /// Current profile of the caller, creating the default one if needed
    ///
    /// # Errors
    /// Returns `AppError` if the store fails
    pub async fn current_profile(&self, identity: &Identity) -> Result<Profile, AppError> {
        let profile = self
            .store
            .get_or_insert_current(&identity.org_id, self.default_profile(identity))
            .await?;
        Ok(profile)
    }

    /// Persist a new profile version and hand it to the dispatch actor
    ///
    /// The request succeeds once the row is stored. Submission never waits
    /// on the dispatch backlog and a failure is only logged.
    ///
    /// # Errors
    /// Returns `AppError` if the insert fails
    pub async fn commit(&self, profile: &Profile, identity: &Identity) -> Result<(), AppError> {
        self.store.insert(profile).await?;
        info!(
            org_id = %profile.org_id,
            profile_id = %profile.id,
            active = profile.active,
            "profile stored"
        );

        let submitted = self
            .dispatch
            .tell(ApplyProfile {
                profile: profile.clone(),
                org: identity.org_context(),
            })
            .try_send();
        if let Err(e) = submitted {
            warn!(profile_id = %profile.id, error = %e, "cannot submit profile for dispatch");
        }
        Ok(())
    }
}
