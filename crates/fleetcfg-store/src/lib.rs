//! fleetcfg-store: Versioned profile storage
//!
//! Profiles are append-only: each change inserts a new row and the row
//! with the latest `created_at` is an organization's current profile.

pub mod error;
pub mod query;
pub mod sqlite;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use fleetcfg_api::Profile;

pub use error::{ParseError, StoreError};
pub use query::{Column, Direction, OrderBy};
pub use sqlite::SqliteProfileStore;

/// Append-only profile storage
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Persist a new profile row
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Latest profile of an organization, `NotFound` if there is none
    async fn get_current(&self, org_id: &str) -> Result<Profile, StoreError>;

    /// Current profile, inserting `template` first if the organization has none
    ///
    /// Concurrent first callers may both insert; the later row becomes current.
    async fn get_or_insert_current(
        &self,
        org_id: &str,
        template: Profile,
    ) -> Result<Profile, StoreError> {
        match self.get_current(org_id).await {
            Err(StoreError::NotFound(_)) => {
                info!(org_id, profile_id = %template.id, "inserting default profile");
                self.insert(&template).await?;
                self.get_current(org_id).await
            }
            other => other,
        }
    }

    /// Profile by id
    async fn get(&self, id: Uuid) -> Result<Profile, StoreError>;

    /// Profiles of an organization; `order_by` is `col[,col][:ASC|DESC]`,
    /// non-positive `limit`/`offset` mean unbounded/none
    async fn list(
        &self,
        org_id: &str,
        order_by: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Profile>, StoreError>;

    /// Number of profiles of an organization
    async fn count(&self, org_id: &str) -> Result<i64, StoreError>;
}
