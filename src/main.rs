use log::{debug, error, info, warn};
use pool_controller_bridge::config::{Config, load_dotenv};
use pool_controller_bridge::connection::ConnectionManager;
use pool_controller_bridge::dispatch::Dispatcher;
use pool_controller_bridge::entity::{ChangeNotifier, EntityContext};
use pool_controller_bridge::setup::build_entities;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};

/// Envelopes buffered between the session and the dispatcher.
const ENVELOPE_BUFFER: usize = 256;
const CHANGE_BUFFER: usize = 1024;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();
    // Before the runtime starts: load_dotenv mutates the process environment
    load_dotenv();
    let config = Config::from_env();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(config));
}

async fn run(config: Config) {
    info!("Starting Pool Controller Bridge");
    info!("Configuration loaded:");
    info!("  Controller: {}", config.controller.base_url());
    info!("  Controller ID: {}", config.controller.controller_id());
    info!(
        "  Reconnect: {:?} .. {:?}",
        config.reconnect.min_delay(),
        config.reconnect.max_delay()
    );

    let (tx, rx) = mpsc::channel(ENVELOPE_BUFFER);
    let controller_id = config.controller.controller_id();
    let manager = match ConnectionManager::new(config, tx) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to create connection manager: {}", e);
            std::process::exit(1);
        }
    };
    let rest = manager.rest();

    let Some(snapshot) = rest.state_all().await else {
        error!("Could not fetch initial state from the controller");
        std::process::exit(1);
    };
    if let Some(version) = snapshot.version_string() {
        info!("  Controller version: {}", version);
    }

    let ctx = EntityContext::new(controller_id, rest.clone());
    let entities = build_entities(&snapshot, &*rest, &ctx).await;

    let notifier = ChangeNotifier::new(CHANGE_BUFFER);
    for entity in &entities {
        entity.set_notifier(notifier.clone());
    }

    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register_all(entities);

    let mut changes = notifier.subscribe();
    let change_dispatcher = dispatcher.clone();
    let change_task = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    let state = change_dispatcher
                        .subscribers()
                        .into_iter()
                        .find(|s| s.unique_id() == change.unique_id)
                        .map(|s| s.state());
                    if change.available {
                        info!("{} v{}: {}", change.unique_id, change.version, state.unwrap_or_default());
                    } else {
                        debug!("{} v{} (unavailable)", change.unique_id, change.version);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("State change log lagged, skipped {} changes", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let run_dispatcher = dispatcher.clone();
    let dispatch_task = tokio::spawn(async move { run_dispatcher.run(rx).await });

    manager.connect();
    info!("Pool Controller Bridge is running");
    info!("  - {} entities registered", dispatcher.len());
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    manager.disconnect().await;
    drop(manager);
    if let Err(e) = dispatch_task.await {
        warn!("Dispatcher ended abnormally: {}", e);
    }
    change_task.abort();

    info!("Pool Controller Bridge stopped");
}
