//! Inventory service client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::http::HttpClient;
use crate::traits::HostDirectory;
use crate::types::{HostPage, OrgContext};

const HOSTS_PATH: &str = "/api/inventory/v1/hosts";

/// Lists connector-enabled hosts from the inventory service
#[derive(Debug, Clone)]
pub struct InventoryClient {
    http: HttpClient,
    per_page: u64,
}

impl InventoryClient {
    /// Client with a 10s timeout and 50 hosts per page
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_options(base_url, Duration::from_secs(10), 50)
    }

    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn with_options(base_url: impl AsRef<str>, timeout: Duration, per_page: u64) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, timeout, HeaderMap::new())?,
            per_page,
        })
    }
}

#[async_trait]
impl HostDirectory for InventoryClient {
    #[instrument(skip(self, org), fields(org_id = %org.org_id))]
    async fn list(&self, org: &OrgContext, page: u64) -> Result<HostPage> {
        let mut headers = HeaderMap::new();
        if let Some(identity) = &org.identity {
            headers.insert("x-rh-identity", HeaderValue::from_str(identity)?);
        }

        let query = [
            ("filter[system_profile][rhc_client_id]", "not_nil".to_string()),
            ("fields[system_profile]", "rhc_client_id,rhc_config_state".to_string()),
            ("page", page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];

        let hosts: HostPage = self.http.get(HOSTS_PATH, &query, headers).await?;
        debug!(page, count = hosts.count, total = hosts.total, "fetched host page");
        Ok(hosts)
    }
}
