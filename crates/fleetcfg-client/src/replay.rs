//! Scripted doubles for the capability traits
//!
//! Each double replays queued responses in order and records every call
//! so tests can assert on what was sent.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use fleetcfg_api::Host;

use crate::error::{ClientError, Result};
use crate::traits::{Connector, Dispatcher, HostDirectory};
use crate::types::{ConnectionStatus, Directive, HostPage, OrgContext, RunCreated, RunInput};

/// One scripted response
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Ok(T),
    /// Replayed as `ClientError::Api`
    Err { status: u16, message: String },
}

impl<T> Scripted<T> {
    /// Shorthand for a service-side failure
    #[must_use]
    pub fn unavailable() -> Self {
        Scripted::Err {
            status: 503,
            message: "service unavailable".to_string(),
        }
    }

    fn into_result(self) -> Result<T> {
        match self {
            Scripted::Ok(value) => Ok(value),
            Scripted::Err { status, message } => Err(ClientError::Api { status, message }),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn exhausted() -> ClientError {
    ClientError::InvalidResponse("no scripted response left".to_string())
}

/// Replays host pages
#[derive(Debug, Default)]
pub struct ReplayHostDirectory {
    pages: Mutex<VecDeque<Scripted<HostPage>>>,
    calls: Mutex<Vec<(String, u64)>>,
}

impl ReplayHostDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script pages of `per_page` hosts covering `hosts`
    #[must_use]
    pub fn with_hosts(hosts: Vec<Host>, per_page: usize) -> Self {
        let directory = Self::new();
        let total = hosts.len() as u64;
        for (i, chunk) in hosts.chunks(per_page.max(1)).enumerate() {
            directory.push(Scripted::Ok(HostPage {
                total,
                count: chunk.len() as u64,
                page: i as u64 + 1,
                per_page: per_page as u64,
                results: chunk.to_vec(),
            }));
        }
        directory
    }

    pub fn push(&self, page: Scripted<HostPage>) {
        lock(&self.pages).push_back(page);
    }

    /// `(org_id, page)` of every call so far
    #[must_use]
    pub fn calls(&self) -> Vec<(String, u64)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl HostDirectory for ReplayHostDirectory {
    async fn list(&self, org: &OrgContext, page: u64) -> Result<HostPage> {
        lock(&self.calls).push((org.org_id.clone(), page));
        lock(&self.pages)
            .pop_front()
            .ok_or_else(exhausted)?
            .into_result()
    }
}

/// Replays connection statuses and directive answers
///
/// The last scripted status repeats once the script is down to one entry.
#[derive(Debug, Default)]
pub struct ReplayConnector {
    statuses: Mutex<VecDeque<Scripted<ConnectionStatus>>>,
    sends: Mutex<VecDeque<Scripted<String>>>,
    status_calls: Mutex<Vec<(String, String)>>,
    directives: Mutex<Vec<Directive>>,
}

impl ReplayConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: Scripted<ConnectionStatus>) {
        lock(&self.statuses).push_back(status);
    }

    pub fn push_send(&self, answer: Scripted<String>) {
        lock(&self.sends).push_back(answer);
    }

    /// `(org_id, host_id)` of every status query
    #[must_use]
    pub fn status_calls(&self) -> Vec<(String, String)> {
        lock(&self.status_calls).clone()
    }

    /// Every directive sent so far
    #[must_use]
    pub fn directives(&self) -> Vec<Directive> {
        lock(&self.directives).clone()
    }
}

/// Build a status with the given capabilities
#[must_use]
pub fn status(state: &str, capabilities: &[&str]) -> ConnectionStatus {
    ConnectionStatus {
        status: state.to_string(),
        dispatchers: capabilities
            .iter()
            .map(|c| ((*c).to_string(), serde_json::Value::Object(Default::default())))
            .collect(),
    }
}

#[async_trait]
impl Connector for ReplayConnector {
    async fn get_status(&self, org_id: &str, host_id: &str) -> Result<ConnectionStatus> {
        lock(&self.status_calls).push((org_id.to_string(), host_id.to_string()));
        let mut statuses = lock(&self.statuses);
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        next.ok_or_else(exhausted)?.into_result()
    }

    async fn send_directive(&self, directive: &Directive) -> Result<String> {
        lock(&self.directives).push(directive.clone());
        lock(&self.sends)
            .pop_front()
            .ok_or_else(exhausted)?
            .into_result()
    }
}

/// Replays batch answers; unscripted batches are accepted in full
#[derive(Debug, Default)]
pub struct ReplayDispatcher {
    answers: Mutex<VecDeque<Scripted<Vec<RunCreated>>>>,
    batches: Mutex<Vec<Vec<RunInput>>>,
}

impl ReplayDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, answer: Scripted<Vec<RunCreated>>) {
        lock(&self.answers).push_back(answer);
    }

    /// Every submitted batch
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<RunInput>> {
        lock(&self.batches).clone()
    }
}

#[async_trait]
impl Dispatcher for ReplayDispatcher {
    async fn submit(&self, batch: &[RunInput]) -> Result<Vec<RunCreated>> {
        lock(&self.batches).push(batch.to_vec());
        match lock(&self.answers).pop_front() {
            Some(answer) => answer.into_result(),
            None => Ok(batch
                .iter()
                .map(|run| RunCreated {
                    code: 201,
                    id: Some(format!("run-{}", run.recipient)),
                })
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(id: &str) -> Host {
        Host {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_host_directory_pages() {
        let directory =
            ReplayHostDirectory::with_hosts(vec![host("a"), host("b"), host("c")], 2);
        let org = OrgContext::new("o1");

        let first = directory.list(&org, 1).await.unwrap();
        let second = directory.list(&org, 2).await.unwrap();

        assert_eq!((first.total, first.count), (3, 2));
        assert_eq!(second.results, vec![host("c")]);
        assert!(directory.list(&org, 3).await.is_err());
        assert_eq!(directory.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_connector_repeats_last_status() {
        let connector = ReplayConnector::new();
        connector.push_status(Scripted::Ok(status("disconnected", &[])));
        connector.push_status(Scripted::Ok(status("connected", &["package-manager"])));

        assert!(connector.get_status("o", "h").await.unwrap().is_disconnected());
        for _ in 0..3 {
            assert!(connector.get_status("o", "h").await.unwrap().is_connected());
        }
        assert_eq!(connector.status_calls().len(), 4);
    }

    #[tokio::test]
    async fn test_dispatcher_accepts_unscripted() {
        let dispatcher = ReplayDispatcher::new();
        let run = RunInput {
            recipient: "c1".to_string(),
            org_id: "o1".to_string(),
            url: "http://x".to_string(),
            labels: Default::default(),
        };

        let results = dispatcher.submit(&[run]).await.unwrap();

        assert_eq!(results[0].id.as_deref(), Some("run-c1"));
        assert_eq!(dispatcher.batches().len(), 1);
    }
}
