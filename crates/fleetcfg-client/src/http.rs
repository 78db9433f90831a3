//! Shared HTTP plumbing for the service clients

use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;
use url::Url;

use crate::error::{ClientError, Result};

/// JSON-over-HTTP client bound to one service base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a client with a request timeout and headers sent on every request
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(
        base_url: impl AsRef<str>,
        timeout: Duration,
        default_headers: HeaderMap,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()?;
        Self::with_client(base_url, client)
    }

    /// Create a client around a custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    /// Build a full URL from a path below the base URL
    ///
    /// A leading `/` does not escape a path prefix on the base.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(ClientError::Url)
    }

    /// Perform a GET request and deserialize the response
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: HeaderMap,
    ) -> Result<T> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        trace!(%url, "GET");
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }

        Ok(response.json().await?)
    }

    /// Perform a POST request with JSON body, returning the status with the body
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Serialize,
        headers: HeaderMap,
    ) -> Result<(u16, T)> {
        let url = self.url(path)?;
        trace!(%url, "POST");
        let response = self
            .client
            .post(url)
            .json(&body)
            .headers(headers)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }

        Ok((status, response.json().await?))
    }
}
