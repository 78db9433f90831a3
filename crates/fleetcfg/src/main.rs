//! fleetcfg daemon
//!
//! Serves the profile HTTP API and runs the dispatcher-result and
//! inventory-event consumers. Consumers read newline-delimited JSON messages
//! from stdin and publish to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use eyre::WrapErr;
use kameo::actor::ActorRef;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fleetcfg_core::queue::channel::channel;
use fleetcfg_core::queue::{LineReader, LineWriter, MessageWriter};
use fleetcfg_core::{
    DispatchActor, DispatchActorArgs, DispatchEvent, DispatchResultHandler, InventoryEventHandler,
    run_consumer,
};
use fleetcfg_store::ProfileStore;

mod api;
mod bridge;
mod config;
mod factory;
mod openapi;
mod router;
mod state;

use bridge::TopicRouter;
use config::{Config, DaemonConfig};
use factory::Services;
use state::AppState;

/// Capacity of each consumer queue
const QUEUE_CAPACITY: usize = 64;

#[derive(Parser)]
#[command(name = "fleetcfg")]
#[command(about = "Fleet configuration profile manager", long_about = None)]
struct Cli {
    /// Config file, overrides FLEETCFG_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Module to run; repeat for several, none runs all
    #[arg(long = "module", value_enum)]
    modules: Vec<Module>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema and exit
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Module {
    HttpApi,
    DispatcherConsumer,
    InventoryConsumer,
}

impl Cli {
    fn modules(&self) -> Vec<Module> {
        if self.modules.is_empty() {
            vec![
                Module::HttpApi,
                Module::DispatcherConsumer,
                Module::InventoryConsumer,
            ]
        } else {
            self.modules.clone()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    init_tracing(&config.daemon);

    if let Some(Command::Migrate) = cli.command {
        factory::open_store(&config)?;
        info!("schema up to date");
        return Ok(());
    }

    run(&config, &cli.modules()).await
}

fn init_tracing(daemon: &DaemonConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&daemon.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if daemon.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: &Config, modules: &[Module]) -> Result<()> {
    info!(?modules, "fleetcfg starting");
    let services = Services::build(config)?;
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        shutdown.cancel();
    });

    let (event_tx, event_rx) = broadcast::channel(QUEUE_CAPACITY);
    tokio::spawn(log_dispatch_events(event_rx));
    let dispatch = DispatchActor::start(DispatchActorArgs {
        dispatcher: services.fleet_dispatcher(config),
        directory: Arc::clone(&services.directory),
        event_tx,
    });

    let store: Arc<dyn ProfileStore> = Arc::new(services.store.clone());
    let writer: Arc<dyn MessageWriter> = Arc::new(LineWriter::new(tokio::io::stdout()));
    let mut topics = TopicRouter::new();
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    for module in modules {
        match module {
            Module::HttpApi => {
                let state = AppState::new(
                    Arc::clone(&store),
                    Arc::clone(&services.compiler),
                    dispatch.clone(),
                    config.service_config.clone(),
                );
                let app = router::create_router(Arc::new(state), &config.daemon);
                let listener = tokio::net::TcpListener::bind(&config.daemon.bind)
                    .await
                    .wrap_err_with(|| format!("cannot bind {}", config.daemon.bind))?;
                info!(bind = %config.daemon.bind, "HTTP API listening");

                let stop = cancel.clone();
                tasks.spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move { stop.cancelled().await })
                        .await
                        .wrap_err("HTTP server failed")
                });
            }
            Module::DispatcherConsumer => {
                let (tx, rx) = channel(QUEUE_CAPACITY);
                topics.subscribe(&config.consumers.dispatcher_topic, tx);
                let handler = Arc::new(DispatchResultHandler::new(
                    Arc::clone(&writer),
                    config.dispatch_results(),
                ));
                let stop = cancel.clone();
                tasks.spawn(async move {
                    let stats = run_consumer(rx, handler, stop).await;
                    info!(?stats, "dispatcher consumer finished");
                    Ok(())
                });
            }
            Module::InventoryConsumer => {
                let (tx, rx) = channel(QUEUE_CAPACITY);
                topics.subscribe(&config.consumers.inventory_topic, tx);
                let handler = Arc::new(
                    InventoryEventHandler::new(
                        Arc::clone(&store),
                        Arc::clone(&services.clock),
                        config.inventory_events(),
                    )
                    .with_enabler(Arc::new(services.host_enabler(config)), cancel.clone())
                    .with_dispatch(dispatch.clone()),
                );
                let stop = cancel.clone();
                tasks.spawn(async move {
                    let stats = run_consumer(rx, handler, stop).await;
                    info!(?stats, "inventory consumer finished");
                    Ok(())
                });
            }
        }
    }

    if !topics.is_empty() {
        let reader = LineReader::new(BufReader::new(tokio::io::stdin()));
        let stop = cancel.clone();
        tasks.spawn(async move {
            topics.run(reader, stop).await;
            Ok(())
        });
    }

    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "module failed");
                cancel.cancel();
                result = Err(e);
            }
            Err(e) => {
                error!(error = %e, "module task died");
                cancel.cancel();
                result = Err(e).wrap_err("module task died");
            }
        }
    }

    stop_dispatch(&dispatch).await;
    info!("fleetcfg stopped");
    result
}

async fn stop_dispatch(dispatch: &ActorRef<DispatchActor>) {
    if let Err(e) = dispatch.stop_gracefully().await {
        warn!(error = %e, "dispatch actor already stopped");
    }
}

async fn log_dispatch_events(mut events: broadcast::Receiver<DispatchEvent>) {
    loop {
        match events.recv().await {
            Ok(DispatchEvent::Completed(report)) => info!(
                profile_id = %report.profile_id,
                accepted = report.accepted(),
                hosts = report.results.len(),
                failed_batches = report.failed_batches.len(),
                skipped = report.skipped_hosts.len(),
                "dispatch completed"
            ),
            Ok(DispatchEvent::Skipped { profile_id }) => {
                info!(%profile_id, "dispatch skipped");
            }
            Ok(DispatchEvent::Failed { profile_id, error }) => {
                warn!(%profile_id, error, "dispatch failed");
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "dispatch event log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
