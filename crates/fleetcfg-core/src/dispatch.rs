//! Fleet dispatch orchestration
//!
//! Compiles a profile once, then submits one playbook run per eligible host
//! in batches. Per-host rejections are carried in the results; a batch whose
//! call fails as a whole is reported without stopping the other batches.

use std::collections::BTreeMap;
use std::sync::Arc;

use fleetcfg_api::events::{LABEL_HOST_ID, LABEL_STATE_ID};
use fleetcfg_api::{Host, Profile};
use fleetcfg_client::{ClientError, Dispatcher, HostDirectory, OrgContext, RunInput};
use fleetcfg_playbook::PlaybookCompiler;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::CoreError;

/// Dispatcher answer for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Inventory host id
    pub host_id: String,
    /// Connector client id the run was addressed to
    pub recipient: String,
    pub code: u16,
    /// Absent when the dispatcher rejected the run
    pub run_id: Option<String>,
}

impl RunResult {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.run_id.is_some() && (200..300).contains(&self.code)
    }
}

/// A batch whose dispatcher call failed as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Inventory host ids of the batch
    pub hosts: Vec<String>,
    pub error: String,
}

/// Everything one dispatch produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub profile_id: Uuid,
    /// Per-host results in host order
    pub results: Vec<RunResult>,
    pub failed_batches: Vec<BatchFailure>,
    /// Hosts without a connector client id
    pub skipped_hosts: Vec<String>,
}

impl DispatchReport {
    /// Number of runs the dispatcher accepted
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.results.iter().filter(|r| r.is_accepted()).count()
    }
}

/// Applies profiles to sets of hosts through the dispatcher
#[derive(Clone)]
pub struct FleetDispatcher {
    compiler: Arc<PlaybookCompiler>,
    dispatcher: Arc<dyn Dispatcher>,
    config: DispatchConfig,
}

impl FleetDispatcher {
    #[must_use]
    pub fn new(
        compiler: Arc<PlaybookCompiler>,
        dispatcher: Arc<dyn Dispatcher>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            compiler,
            dispatcher,
            config,
        }
    }

    /// Dispatch `profile` to `hosts`
    ///
    /// # Errors
    /// Fails only when the profile's playbook cannot be compiled
    #[instrument(skip(self, profile, hosts), fields(profile_id = %profile.id, org_id = %profile.org_id, hosts = hosts.len()))]
    pub async fn dispatch(
        &self,
        profile: &Profile,
        hosts: &[Host],
    ) -> Result<DispatchReport, CoreError> {
        let playbook = self.compiler.compile(&profile.state_config())?;
        debug!(bytes = playbook.len(), "playbook compiled");

        let url = self.config.playbook_url_for(profile.id);
        let mut report = DispatchReport {
            profile_id: profile.id,
            ..Default::default()
        };

        let mut eligible = Vec::with_capacity(hosts.len());
        for host in hosts {
            match host.connector_id() {
                Some(client_id) => eligible.push((host, client_id)),
                None => {
                    warn!(host = %host.id, "host has no connector client id, skipping");
                    report.skipped_hosts.push(host.id.clone());
                }
            }
        }

        for batch in eligible.chunks(self.config.batch_size.max(1)) {
            let inputs: Vec<RunInput> = batch
                .iter()
                .map(|(host, client_id)| RunInput {
                    recipient: (*client_id).to_string(),
                    org_id: profile.org_id.clone(),
                    url: url.clone(),
                    labels: BTreeMap::from([
                        (LABEL_STATE_ID.to_string(), profile.id.to_string()),
                        (LABEL_HOST_ID.to_string(), host.id.clone()),
                    ]),
                })
                .collect();

            let outcome = self.dispatcher.submit(&inputs).await.and_then(|created| {
                if created.len() == inputs.len() {
                    Ok(created)
                } else {
                    Err(ClientError::InvalidResponse(format!(
                        "{} results for {} runs",
                        created.len(),
                        inputs.len()
                    )))
                }
            });

            match outcome {
                Ok(created) => {
                    let runs = inputs.iter().zip(created);
                    for (&(host, _), (input, run)) in batch.iter().zip(runs) {
                        if run.is_accepted() {
                            debug!(host = %host.id, run_id = ?run.id, "run created");
                        } else {
                            warn!(host = %host.id, code = run.code, "run rejected");
                        }
                        report.results.push(RunResult {
                            host_id: host.id.clone(),
                            recipient: input.recipient.clone(),
                            code: run.code,
                            run_id: run.id,
                        });
                    }
                }
                Err(e) => {
                    error!(error = %e, size = batch.len(), "dispatch batch failed");
                    report.failed_batches.push(BatchFailure {
                        hosts: batch.iter().map(|(host, _)| host.id.clone()).collect(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            accepted = report.accepted(),
            results = report.results.len(),
            failed_batches = report.failed_batches.len(),
            skipped = report.skipped_hosts.len(),
            "dispatch finished"
        );
        Ok(report)
    }
}

/// Fetch every page of the organization's hosts
///
/// # Errors
/// Any page failure aborts the whole resolution
#[instrument(skip(directory, org), fields(org_id = %org.org_id))]
pub async fn resolve_hosts(
    directory: &dyn HostDirectory,
    org: &OrgContext,
) -> Result<Vec<Host>, CoreError> {
    let mut hosts = Vec::new();
    let mut page = 1;
    loop {
        let listing = directory.list(org, page).await?;
        let total = listing.total;
        if listing.results.is_empty() {
            break;
        }
        hosts.extend(listing.results);
        if hosts.len() as u64 >= total {
            break;
        }
        page += 1;
    }
    debug!(count = hosts.len(), "hosts resolved");
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use fleetcfg_api::profile::{ENABLED, INSIGHTS};
    use fleetcfg_api::{StateMap, SystemProfile};
    use fleetcfg_client::RunCreated;
    use fleetcfg_client::replay::{ReplayDispatcher, ReplayHostDirectory, Scripted};
    use fleetcfg_playbook::TemplateRegistry;

    use super::*;

    fn host(id: &str, client_id: Option<&str>) -> Host {
        Host {
            id: id.to_string(),
            org_id: "org-1".to_string(),
            system_profile: SystemProfile {
                rhc_client_id: client_id.map(ToString::to_string),
                rhc_config_state: None,
            },
            ..Default::default()
        }
    }

    fn profile() -> Profile {
        let state: StateMap = [(INSIGHTS.to_string(), ENABLED.to_string())].into();
        let mut profile = Profile::new("org-1", None, &state);
        profile.active = true;
        profile
    }

    fn fleet(dispatcher: &Arc<ReplayDispatcher>, batch_size: usize) -> FleetDispatcher {
        let registry = TemplateRegistry::from_templates([(
            "insights_setup".to_string(),
            "---\n- name: setup insights\n".to_string(),
        )]);
        FleetDispatcher::new(
            Arc::new(PlaybookCompiler::new(Arc::new(registry))),
            dispatcher.clone(),
            DispatchConfig {
                batch_size,
                playbook_url: "http://cm/playbooks?profile_id={profile_id}".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_partial_rejection_keeps_other_results() {
        let dispatcher = Arc::new(ReplayDispatcher::new());
        dispatcher.push(Scripted::Ok(vec![
            RunCreated { code: 200, id: Some("a".to_string()) },
            RunCreated { code: 404, id: None },
        ]));
        let hosts = [host("h1", Some("c1")), host("h2", Some("c2"))];

        let report = fleet(&dispatcher, 50).dispatch(&profile(), &hosts).await.unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].run_id.as_deref(), Some("a"));
        assert!(report.results[0].is_accepted());
        assert_eq!(report.results[1].code, 404);
        assert!(!report.results[1].is_accepted());
        assert!(report.failed_batches.is_empty());
    }

    #[tokio::test]
    async fn test_batches_and_labels() {
        let dispatcher = Arc::new(ReplayDispatcher::new());
        let profile = profile();
        let hosts: Vec<Host> = (0..5)
            .map(|i| host(&format!("h{i}"), Some(&format!("c{i}"))))
            .collect();

        let report = fleet(&dispatcher, 2).dispatch(&profile, &hosts).await.unwrap();

        let batches = dispatcher.batches();
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        let first = &batches[0][0];
        assert_eq!(first.recipient, "c0");
        assert_eq!(first.url, format!("http://cm/playbooks?profile_id={}", profile.id));
        assert_eq!(first.labels[LABEL_STATE_ID], profile.id.to_string());
        assert_eq!(first.labels[LABEL_HOST_ID], "h0");
        let order: Vec<&str> = report.results.iter().map(|r| r.host_id.as_str()).collect();
        assert_eq!(order, vec!["h0", "h1", "h2", "h3", "h4"]);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_others() {
        let dispatcher = Arc::new(ReplayDispatcher::new());
        dispatcher.push(Scripted::unavailable());
        let hosts = [host("h1", Some("c1")), host("h2", Some("c2")), host("h3", Some("c3"))];

        let report = fleet(&dispatcher, 2).dispatch(&profile(), &hosts).await.unwrap();

        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(report.failed_batches[0].hosts, vec!["h1", "h2"]);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].host_id, "h3");
    }

    #[tokio::test]
    async fn test_result_count_mismatch_fails_batch() {
        let dispatcher = Arc::new(ReplayDispatcher::new());
        dispatcher.push(Scripted::Ok(vec![RunCreated { code: 201, id: Some("a".to_string()) }]));
        let hosts = [host("h1", Some("c1")), host("h2", Some("c2"))];

        let report = fleet(&dispatcher, 50).dispatch(&profile(), &hosts).await.unwrap();

        assert!(report.results.is_empty());
        assert_eq!(report.failed_batches.len(), 1);
    }

    #[tokio::test]
    async fn test_hosts_without_connector_are_skipped() {
        let dispatcher = Arc::new(ReplayDispatcher::new());
        let hosts = [host("h1", None), host("h2", Some("c2")), host("h3", Some(""))];

        let report = fleet(&dispatcher, 50).dispatch(&profile(), &hosts).await.unwrap();

        assert_eq!(report.skipped_hosts, vec!["h1", "h3"]);
        assert_eq!(dispatcher.batches()[0].len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_hosts_pages_until_total() {
        let hosts: Vec<Host> = (0..5).map(|i| host(&format!("h{i}"), Some("c"))).collect();
        let directory = ReplayHostDirectory::with_hosts(hosts, 2);
        let org = OrgContext::new("org-1");

        let resolved = resolve_hosts(&directory, &org).await.unwrap();

        assert_eq!(resolved.len(), 5);
        let pages: Vec<u64> = directory.calls().iter().map(|(_, p)| *p).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_resolve_hosts_page_failure_aborts() {
        let directory = ReplayHostDirectory::with_hosts(
            (0..4).map(|i| host(&format!("h{i}"), Some("c"))).collect(),
            2,
        );
        let failing = ReplayHostDirectory::new();
        failing.push(Scripted::Ok(directory.list(&OrgContext::new("o"), 1).await.unwrap()));
        failing.push(Scripted::unavailable());

        let err = resolve_hosts(&failing, &OrgContext::new("org-1")).await.unwrap_err();

        assert!(matches!(err, CoreError::Client(ClientError::Api { status: 503, .. })));
    }
}
