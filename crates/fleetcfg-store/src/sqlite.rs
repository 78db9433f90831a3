//! SQLite-backed profile store
//!
//! One connection behind a mutex, shared by every clone of the store.
//! Statements go through the connection's prepared-statement cache, keyed
//! by SQL text. Async callers run on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, instrument};
use uuid::Uuid;

use fleetcfg_api::Profile;

use crate::ProfileStore;
use crate::error::StoreError;
use crate::query::{OrderBy, PROFILE_COLUMNS, list_sql, page_bounds};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    profile_id   TEXT PRIMARY KEY NOT NULL,
    name         TEXT,
    label        TEXT,
    account_id   TEXT,
    org_id       TEXT NOT NULL,
    created_at   INTEGER NOT NULL,
    active       INTEGER NOT NULL DEFAULT 0,
    creator      TEXT,
    insights     INTEGER NOT NULL DEFAULT 0,
    remediations INTEGER NOT NULL DEFAULT 0,
    compliance   INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS profiles_org_created ON profiles (org_id, created_at);
";

const STATEMENT_CACHE_CAPACITY: usize = 32;

/// Profile store over a single SQLite connection
#[derive(Clone)]
pub struct SqliteProfileStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProfileStore {
    /// Open (or create) a database file and apply the schema
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if the database cannot be opened or migrated
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if the schema cannot be applied
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create the `profiles` table if missing
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if the DDL fails
    pub fn migrate(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| Ok(conn.execute_batch(SCHEMA_SQL)?))
    }

    /// Execute a raw SQL batch, used to bootstrap fixtures
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if any statement fails
    pub fn seed(&self, sql: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Task("database mutex poisoned".to_string()))?;
        f(&conn)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteProfileStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Task(format!("join error: {e}")))?
    }

    /// Insert one profile row
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if the write is not committed
    pub fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO profiles (profile_id, name, label, account_id, org_id, created_at, \
                 active, creator, insights, remediations, compliance) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            stmt.execute(params![
                profile.id.to_string(),
                profile.name,
                profile.label,
                profile.account_id,
                profile.org_id,
                profile.created_at.timestamp_micros(),
                profile.active,
                profile.creator,
                profile.insights,
                profile.remediations,
                profile.compliance,
            ])?;
            Ok(())
        })
    }

    /// Most recently created profile for an organization
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the organization has no profiles
    pub fn current_profile(&self, org_id: &str) -> Result<Profile, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles WHERE org_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            stmt.query_row(params![org_id], profile_from_row)
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("no current profile for org {org_id}")))
        })
    }

    /// Profile by id
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if no row has this id
    pub fn profile(&self, id: Uuid) -> Result<Profile, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE profile_id = ?1");
            let mut stmt = conn.prepare_cached(&sql)?;
            stmt.query_row(params![id.to_string()], profile_from_row)
                .optional()?
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        })
    }

    /// Profiles of an organization, optionally sorted and paged
    ///
    /// # Errors
    /// Returns `StoreError::Parse` for a bad sort expression
    pub fn list_profiles(
        &self,
        org_id: &str,
        order_by: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Profile>, StoreError> {
        let order = OrderBy::parse(order_by)?;
        let sql = list_sql(order.as_ref());
        let (limit, offset) = page_bounds(limit, offset);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params![org_id, limit, offset], profile_from_row)?;
            let profiles = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(profiles)
        })
    }

    /// Number of profiles stored for an organization
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if the query fails
    pub fn count_profiles(&self, org_id: &str) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT COUNT(*) FROM profiles WHERE org_id = ?1")?;
            Ok(stmt.query_row(params![org_id], |row| row.get(0))?)
        })
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let micros: i64 = row.get(5)?;
    let created_at = DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(5, micros))?;

    Ok(Profile {
        id,
        name: row.get(1)?,
        label: row.get(2)?,
        account_id: row.get(3)?,
        org_id: row.get(4)?,
        created_at,
        active: row.get(6)?,
        creator: row.get(7)?,
        insights: row.get(8)?,
        remediations: row.get(9)?,
        compliance: row.get(10)?,
    })
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    #[instrument(skip(self, profile), fields(profile_id = %profile.id, org_id = %profile.org_id))]
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        let profile = profile.clone();
        self.blocking(move |store| store.insert_profile(&profile))
            .await?;
        debug!("profile inserted");
        Ok(())
    }

    async fn get_current(&self, org_id: &str) -> Result<Profile, StoreError> {
        let org_id = org_id.to_string();
        self.blocking(move |store| store.current_profile(&org_id))
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Profile, StoreError> {
        self.blocking(move |store| store.profile(id)).await
    }

    async fn list(
        &self,
        org_id: &str,
        order_by: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Profile>, StoreError> {
        let org_id = org_id.to_string();
        let order_by = order_by.to_string();
        self.blocking(move |store| store.list_profiles(&org_id, &order_by, limit, offset))
            .await
    }

    async fn count(&self, org_id: &str) -> Result<i64, StoreError> {
        let org_id = org_id.to_string();
        self.blocking(move |store| store.count_profiles(&org_id))
            .await
    }
}
