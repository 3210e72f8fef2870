//! # hearthlinkd: hearthlink bridge daemon
//!
//! Composition root that wires the transports into the bridge and runs
//! until signalled.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise logging
//! - Bring up each enabled transport: local network, cloud bus, radio
//! - Construct the dispatcher, reconciler and bridge, and register devices
//! - Spawn the inbound, refresh and scan loops
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use hearthlink_adapter_ble::{BleDriver, BtleplugRadio, WirelessDriver, WirelessError};
use hearthlink_adapter_cloud::CloudClient;
use hearthlink_adapter_lan::LanClient;
use hearthlink_app::bridge::{Bridge, InboundUpdate, SCAN_WINDOW, reading_sink, refresh_sensors};
use hearthlink_app::event_bus::StateEventBus;
use hearthlink_app::services::{Dispatcher, Reconciler, WirelessQueue};

use crate::config::Config;

const INBOUND_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 256;

type AppDispatcher = Dispatcher<Arc<LanClient>, Arc<CloudClient>, Arc<BleDriver>>;
type AppBridge = Bridge<Arc<LanClient>, Arc<CloudClient>, Arc<BleDriver>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundUpdate>(INBOUND_CAPACITY);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let mut dispatcher: AppDispatcher = Dispatcher::new(WirelessQueue::with_timeout(
        config.ble.control_interval(),
        config.ble.job_timeout(),
    ));

    // Local network
    let lan = if config.lan.disable {
        tracing::info!("local network transport disabled");
        None
    } else {
        match LanClient::bind(config.lan.clone()).await {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                tracing::error!(error = %err, "local network transport unavailable");
                None
            }
        }
    };
    if let Some(lan) = &lan {
        dispatcher = dispatcher.with_lan(Arc::clone(lan));
    }

    // Cloud bus
    let cloud = if config.cloud.disable {
        tracing::info!("cloud transport disabled");
        None
    } else {
        let (client, event_loop) = CloudClient::connect(&config.cloud, inbound_tx.clone());
        tasks.push(event_loop);
        Some(Arc::new(client))
    };
    if let Some(cloud) = &cloud {
        dispatcher = dispatcher.with_cloud(Arc::clone(cloud));
    }

    // Radio
    let driver = if config.ble.disable {
        tracing::info!("wireless transport disabled");
        None
    } else {
        match start_wireless(&config).await {
            Ok(driver) => Some(Arc::new(driver)),
            Err(err) => {
                tracing::error!(error = %err, "wireless transport unavailable");
                None
            }
        }
    };
    if let Some(driver) = &driver {
        dispatcher = dispatcher.with_wireless(Arc::clone(driver));
    }

    let bridge: Arc<AppBridge> = Arc::new(Bridge::new(
        dispatcher,
        Reconciler::new(),
        StateEventBus::new(EVENT_CAPACITY),
    ));
    for record in config.device_records()? {
        bridge.register_profiled(record)?;
    }

    tasks.push(tokio::spawn(log_events(bridge.events().subscribe())));
    tasks.push({
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.run_inbound(inbound_rx).await })
    });

    if let Some(lan) = lan {
        tasks.push({
            let lan = Arc::clone(&lan);
            let tx = inbound_tx.clone();
            tokio::spawn(async move {
                if let Err(err) = lan.listen(tx).await {
                    tracing::error!(error = %err, "local network listener stopped");
                }
            })
        });
        tasks.push({
            let lan = Arc::clone(&lan);
            tokio::spawn(every(config.lan.scan_interval(), move || {
                let lan = Arc::clone(&lan);
                async move {
                    if let Err(err) = lan.scan().await {
                        tracing::warn!(error = %err, "local network scan failed");
                    }
                }
            }))
        });
        tasks.push({
            let bridge = Arc::clone(&bridge);
            tokio::spawn(every(config.lan.refresh_period(), move || {
                let lan = Arc::clone(&lan);
                let bridge = Arc::clone(&bridge);
                async move { lan.refresh(&bridge.devices()).await }
            }))
        });
    }

    if let Some(cloud) = cloud {
        tasks.push({
            let bridge = Arc::clone(&bridge);
            tokio::spawn(every(config.cloud.refresh_period(), move || {
                let cloud = Arc::clone(&cloud);
                let bridge = Arc::clone(&bridge);
                async move { cloud.refresh(&bridge.devices()).await }
            }))
        });
    }

    if let Some(driver) = &driver {
        let driver = Arc::clone(driver);
        let sink = reading_sink(inbound_tx.clone());
        let period = config.ble.refresh_period();
        tasks.push(tokio::spawn(async move {
            refresh_sensors(driver.as_ref(), sink, period, SCAN_WINDOW).await;
        }));
    }

    // Every producer holds its own sender now.
    drop(inbound_tx);

    tracing::info!(devices = bridge.devices().len(), "hearthlinkd running");
    shutdown_signal().await;
    tracing::info!("shutting down");

    for task in &tasks {
        task.abort();
    }
    if let Some(driver) = driver {
        driver.shutdown().await;
    }

    Ok(())
}

async fn start_wireless(config: &Config) -> Result<BleDriver, WirelessError> {
    let radio = Arc::new(BtleplugRadio::first_adapter().await?);
    let driver = WirelessDriver::start(radio, config.ble.clone()).await?;
    if let Err(err) = driver.wait_for_power_on(config.ble.power_on_timeout()).await {
        tracing::warn!(
            error = %err,
            "radio not powered on yet, commands will be refused until it is"
        );
    }
    Ok(driver)
}

/// Run `job` every `period`, first immediately.
async fn every<F, Fut>(period: Duration, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        job().await;
    }
}

async fn log_events(mut events: broadcast::Receiver<hearthlink_app::event_bus::DeviceEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                tracing::info!(
                    device = %event.device,
                    source = %event.source,
                    changes = ?event.changes,
                    "device state changed"
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
