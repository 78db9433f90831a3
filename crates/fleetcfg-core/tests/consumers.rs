use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use fleetcfg_api::Profile;
use fleetcfg_client::replay::{ReplayConnector, ReplayDispatcher, ReplayHostDirectory, Scripted, status};
use fleetcfg_core::queue::channel::channel;
use fleetcfg_core::*;
use fleetcfg_playbook::{PlaybookCompiler, TemplateRegistry};
use fleetcfg_store::{ProfileStore, SqliteProfileStore, StoreError};

/// Counts every store call before delegating to SQLite
struct CountingStore {
    inner: SqliteProfileStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        let inner = SqliteProfileStore::open_in_memory().unwrap();
        inner.migrate().unwrap();
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for CountingStore {
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        self.touch();
        self.inner.insert(profile).await
    }

    async fn get_current(&self, org_id: &str) -> Result<Profile, StoreError> {
        self.touch();
        self.inner.get_current(org_id).await
    }

    async fn get(&self, id: Uuid) -> Result<Profile, StoreError> {
        self.touch();
        self.inner.get(id).await
    }

    async fn list(
        &self,
        org_id: &str,
        order_by: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Profile>, StoreError> {
        self.touch();
        self.inner.list(org_id, order_by, limit, offset).await
    }

    async fn count(&self, org_id: &str) -> Result<i64, StoreError> {
        self.touch();
        self.inner.count(org_id).await
    }
}

fn inventory_event(event_type: &str, timestamp: DateTime<Utc>, config_state: Option<&str>) -> Message {
    let body = json!({
        "type": event_type,
        "timestamp": timestamp,
        "host": {
            "id": "host-1",
            "account": "0000001",
            "org_id": "org-1",
            "reporter": "cloud-connector",
            "system_profile": {
                "rhc_client_id": "client-1",
                "rhc_config_state": config_state,
            },
        },
    });
    Message::new("platform.inventory.events", body.to_string().into_bytes())
        .with_header("event_type", event_type)
}

fn converging_config() -> InventoryEventConfig {
    InventoryEventConfig {
        enable_on_create: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_stale_event_makes_no_store_call() {
    let store = Arc::new(CountingStore::new());
    let clock = Arc::new(ManualClock::default());
    let handler = InventoryEventHandler::new(store.clone(), clock.clone(), converging_config());
    let sent_at = clock.now();
    clock.advance(Duration::from_secs(25 * 60 * 60));

    let outcome = handler
        .handle(inventory_event("updated", sent_at, None))
        .await
        .unwrap();

    assert!(matches!(outcome, InventoryOutcome::Stale { .. }));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_fresh_event_inserts_default_profile_once() {
    let store = Arc::new(CountingStore::new());
    let clock = Arc::new(ManualClock::default());
    let handler = InventoryEventHandler::new(store.clone(), clock.clone(), converging_config());

    let first = handler
        .handle(inventory_event("updated", clock.now(), None))
        .await
        .unwrap();
    let second = handler
        .handle(inventory_event("updated", clock.now(), None))
        .await
        .unwrap();

    let InventoryOutcome::Processed { profile_id, dispatched } = first else {
        panic!("expected processing, got {first:?}");
    };
    assert!(!dispatched);
    assert_eq!(second, InventoryOutcome::Processed { profile_id, dispatched: false });

    let current = store.inner.get_current("org-1").await.unwrap();
    assert_eq!(current.id, profile_id);
    assert!(!current.active);
    assert!(current.insights && current.remediations && current.compliance);
    assert_eq!(current.account_id.as_deref(), Some("0000001"));
    assert_eq!(store.inner.count("org-1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_irrelevant_events_are_ignored() {
    let store = Arc::new(CountingStore::new());
    let clock = Arc::new(ManualClock::default());
    let handler = InventoryEventHandler::new(store.clone(), clock.clone(), converging_config());

    let deleted = handler
        .handle(inventory_event("delete", clock.now(), None))
        .await
        .unwrap();

    let body = json!({
        "type": "created",
        "timestamp": clock.now(),
        "host": {"id": "host-2", "org_id": "org-1", "system_profile": {}},
    });
    let no_connector = handler
        .handle(
            Message::new("platform.inventory.events", body.to_string().into_bytes())
                .with_header("event_type", "created"),
        )
        .await
        .unwrap();

    assert!(matches!(deleted, InventoryOutcome::Ignored { .. }));
    assert!(matches!(no_connector, InventoryOutcome::Ignored { .. }));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_event_without_org_makes_no_store_call() {
    let store = Arc::new(CountingStore::new());
    let clock = Arc::new(ManualClock::default());
    let handler = InventoryEventHandler::new(store.clone(), clock.clone(), converging_config());
    let body = json!({
        "type": "created",
        "timestamp": clock.now(),
        "host": {
            "id": "host-3",
            "org_id": "",
            "system_profile": {"rhc_client_id": "client-3"},
        },
    });

    let outcome = handler
        .handle(
            Message::new("platform.inventory.events", body.to_string().into_bytes())
                .with_header("event_type", "created"),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, InventoryOutcome::Ignored { .. }));
    assert_eq!(store.calls(), 0);
    assert_eq!(store.inner.count("").await.unwrap(), 0);
}

#[tokio::test]
async fn test_active_profile_converges_host_reporting_another() {
    let store = Arc::new(CountingStore::new());
    let clock = Arc::new(ManualClock::default());
    let mut current = Profile::new("org-1", None, &config::default_service_state());
    current.active = true;
    store.inner.insert(&current).await.unwrap();

    let dispatcher = Arc::new(ReplayDispatcher::new());
    let registry = Arc::new(TemplateRegistry::from_templates([("insights_setup", "- name: x\n")]));
    let (event_tx, mut events) = broadcast::channel(8);
    let actor = DispatchActor::start(DispatchActorArgs {
        dispatcher: FleetDispatcher::new(
            Arc::new(PlaybookCompiler::new(registry)),
            dispatcher.clone(),
            DispatchConfig::default(),
        ),
        directory: Arc::new(ReplayHostDirectory::new()),
        event_tx,
    });
    let handler = InventoryEventHandler::new(store.clone(), clock.clone(), converging_config())
        .with_dispatch(actor.clone());

    let up_to_date = handler
        .handle(inventory_event("updated", clock.now(), Some(&current.id.to_string())))
        .await
        .unwrap();
    assert_eq!(
        up_to_date,
        InventoryOutcome::Processed { profile_id: current.id, dispatched: false }
    );

    let behind = handler
        .handle(inventory_event("updated", clock.now(), Some("some-old-profile")))
        .await
        .unwrap();
    assert_eq!(
        behind,
        InventoryOutcome::Processed { profile_id: current.id, dispatched: true }
    );

    let DispatchEvent::Completed(report) = events.recv().await.unwrap() else {
        panic!("expected completion");
    };
    assert_eq!(report.profile_id, current.id);
    assert_eq!(report.results[0].host_id, "host-1");
    assert_eq!(dispatcher.batches()[0][0].recipient, "client-1");

    actor.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_created_host_is_enabled_before_convergence() {
    let store = Arc::new(CountingStore::new());
    let clock = Arc::new(ManualClock::default());
    let connector = Arc::new(ReplayConnector::new());
    connector.push_status(Scripted::Ok(status("connected", &["package-manager"])));
    connector.push_status(Scripted::Ok(status(
        "connected",
        &["package-manager", "rhc-worker-playbook"],
    )));
    connector.push_send(Scripted::Ok("msg-1".to_string()));
    let enabler = Arc::new(HostEnabler::new(connector.clone(), clock.clone(), EnableConfig::default()));
    let handler = InventoryEventHandler::new(store.clone(), clock.clone(), InventoryEventConfig::default())
        .with_enabler(enabler, CancellationToken::new());

    let outcome = handler
        .handle(inventory_event("created", clock.now(), None))
        .await
        .unwrap();

    assert!(matches!(outcome, InventoryOutcome::Processed { dispatched: false, .. }));
    assert_eq!(connector.directives().len(), 1);
}

#[tokio::test]
async fn test_created_host_enablement_failure_fails_message() {
    let store = Arc::new(CountingStore::new());
    let clock = Arc::new(ManualClock::default());
    let connector = Arc::new(ReplayConnector::new());
    connector.push_status(Scripted::Ok(status("connected", &[])));
    let enabler = Arc::new(HostEnabler::new(connector, clock.clone(), EnableConfig::default()));
    let handler = InventoryEventHandler::new(store, clock.clone(), InventoryEventConfig::default())
        .with_enabler(enabler, CancellationToken::new());

    let err = handler
        .handle(inventory_event("created", clock.now(), None))
        .await
        .unwrap_err();

    assert!(matches!(err, ConsumerError::Enable(EnableError::MissingBaseCapability(_))));
}

#[tokio::test]
async fn test_consumer_isolates_failures_and_publishes_results() {
    let (in_writer, in_reader) = channel(16);
    let (out_writer, mut out_reader) = channel(16);
    let handler = Arc::new(DispatchResultHandler::new(
        Arc::new(out_writer),
        DispatchResultConfig::default(),
    ));

    let success = json!({
        "payload": {
            "org_id": "org-1",
            "recipient": "client-1",
            "labels": {"id": "host-1", "state_id": "p-1"},
            "status": "success",
        }
    });
    in_writer
        .write_message(Message::new("runs", b"{broken".to_vec()).with_header("service", "config_manager"))
        .await
        .unwrap();
    in_writer
        .write_message(
            Message::new("runs", success.to_string().into_bytes()).with_header("service", "config_manager"),
        )
        .await
        .unwrap();
    in_writer
        .write_message(Message::new("runs", b"{}".to_vec()).with_header("service", "remediations"))
        .await
        .unwrap();
    drop(in_writer);

    let stats = run_consumer(in_reader, handler, CancellationToken::new()).await;

    assert_eq!(stats.read, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    let published = out_reader.drain();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key.as_deref(), Some("cm-host-1"));
}

#[tokio::test]
async fn test_cancelled_consumer_stops_reading() {
    let (_in_writer, in_reader) = channel(1);
    let (out_writer, _out_reader) = channel(1);
    let handler = Arc::new(DispatchResultHandler::new(
        Arc::new(out_writer),
        DispatchResultConfig::default(),
    ));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = run_consumer(in_reader, handler, cancel).await;

    assert_eq!(stats, ConsumerStats::default());
}
