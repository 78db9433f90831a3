//! Cloud connector client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::{ClientError, Result};
use crate::http::HttpClient;
use crate::traits::Connector;
use crate::types::{ConnectionStatus, Directive};

const STATUS_PATH: &str = "/api/cloud-connector/v2/connections/status";
const MESSAGES_PATH: &str = "/api/cloud-connector/v2/messages";

#[derive(Deserialize)]
struct MessageCreated {
    id: String,
}

/// Queries host connectivity and routes directives through the connector
#[derive(Debug, Clone)]
pub struct ConnectorClient {
    http: HttpClient,
}

impl ConnectorClient {
    /// # Errors
    /// Returns an error if the base URL or credentials are not usable.
    pub fn new(
        base_url: impl AsRef<str>,
        client_id: &str,
        psk: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-rh-cloud-connector-client-id", HeaderValue::from_str(client_id)?);
        headers.insert("x-rh-cloud-connector-psk", HeaderValue::from_str(psk)?);

        Ok(Self {
            http: HttpClient::new(base_url, timeout, headers)?,
        })
    }

    fn request_headers(org_id: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-rh-cloud-connector-org-id", HeaderValue::from_str(org_id)?);
        headers.insert(
            "x-rh-insights-request-id",
            HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl Connector for ConnectorClient {
    #[instrument(skip(self))]
    async fn get_status(&self, org_id: &str, host_id: &str) -> Result<ConnectionStatus> {
        let body = json!({ "org_id": org_id, "node_id": host_id });
        let (_, status): (u16, ConnectionStatus) = self
            .http
            .post(STATUS_PATH, body, Self::request_headers(org_id)?)
            .await?;
        debug!(status = %status.status, capabilities = status.dispatchers.len(), "connection status");
        Ok(status)
    }

    #[instrument(skip(self, directive), fields(org_id = %directive.org_id, recipient = %directive.recipient))]
    async fn send_directive(&self, directive: &Directive) -> Result<String> {
        let payload: serde_json::Value = serde_json::from_slice(&directive.payload)?;
        let body = json!({
            "directive": directive.directive,
            "payload": payload,
            "metadata": directive.metadata,
            "recipient": directive.recipient,
        });

        let (status, created): (u16, MessageCreated) = self
            .http
            .post(MESSAGES_PATH, body, Self::request_headers(&directive.org_id)?)
            .await?;
        if status != 201 {
            return Err(ClientError::UnexpectedStatus {
                status,
                expected: 201,
            });
        }

        debug!(message_id = %created.id, "directive sent");
        Ok(created.id)
    }
}
