//! Playbook dispatcher client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, instrument};

use crate::error::{ClientError, Result};
use crate::http::HttpClient;
use crate::traits::Dispatcher;
use crate::types::{RunCreated, RunInput};

const DISPATCH_PATH: &str = "/internal/v2/dispatch";

/// The dispatcher answers a batch with Multi-Status
const MULTI_STATUS: u16 = 207;

/// Submits playbook runs to the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherClient {
    http: HttpClient,
}

impl DispatcherClient {
    /// # Errors
    /// Returns an error if the base URL or PSK are not usable.
    pub fn new(base_url: impl AsRef<str>, psk: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("PSK {psk}"))?);

        Ok(Self {
            http: HttpClient::new(base_url, timeout, headers)?,
        })
    }
}

#[async_trait]
impl Dispatcher for DispatcherClient {
    #[instrument(skip(self, batch), fields(runs = batch.len()))]
    async fn submit(&self, batch: &[RunInput]) -> Result<Vec<RunCreated>> {
        let (status, results): (u16, Vec<RunCreated>) = self
            .http
            .post(DISPATCH_PATH, batch, HeaderMap::new())
            .await?;
        if status != MULTI_STATUS {
            return Err(ClientError::UnexpectedStatus {
                status,
                expected: MULTI_STATUS,
            });
        }

        debug!(results = results.len(), "batch dispatched");
        Ok(results)
    }
}
