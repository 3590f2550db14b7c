//! Process wiring: configuration, broker connection, and the background
//! tasks that feed the dispatcher.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relay_common::{LoadRegistry, RuntimeConfig};
use rumqttc::{AsyncClient, MqttOptions};
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use crate::actuator::{ActuatorDriver, SimulatedFanDrive, SimulatedPin};
use crate::dispatch::{self, Dispatcher};
use crate::display::{self, Gesture, LocalUiMirror, Panel, TablePanel};
use crate::remote::{self, RemoteMirror};
use crate::sampler::{self, CurrentSampler, SimulatedAdc};

struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    fn new() -> Self {
        let data_dir = std::env::var("RELAY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.smart-relay"));

        Self {
            path: data_dir.join("config.json"),
        }
    }

    async fn load(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut config = store.load().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    config.sanitize();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(config.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.network.mqtt_port);

    let mut mqtt_options =
        MqttOptions::new(config.network.client_id.clone(), mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(config.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(config.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (client, eventloop) = AsyncClient::new(mqtt_options, 64);

    let (publish_tx, publish_rx) = remote::publish_queue();
    let (request_tx, request_rx) = dispatch::request_queue();

    let actuator = Arc::new(ActuatorDriver::new(
        Box::new(SimulatedPin::new("heater")),
        Box::new(SimulatedPin::new("light")),
        Box::new(SimulatedPin::new("status")),
        Box::new(SimulatedFanDrive::new()),
    ));
    let local_ui = Arc::new(LocalUiMirror::new(TablePanel::new(), request_tx.clone()));
    let remote_mirror = Arc::new(RemoteMirror::new(publish_tx, request_tx));
    let dispatcher = Arc::new(Dispatcher::new(
        LoadRegistry::new(),
        actuator,
        local_ui.clone(),
        remote_mirror.clone(),
    ));

    remote::subscribe_topics(&client)
        .await
        .context("failed to subscribe command topics")?;

    tokio::spawn(remote::run_event_loop(remote_mirror.clone(), eventloop));
    tokio::spawn(remote::run_publisher(client, publish_rx));
    tokio::spawn(dispatch::run_request_loop(dispatcher.clone(), request_rx));

    let sampler = CurrentSampler::new(SimulatedAdc::new(), &config.relay);
    tokio::spawn(sampler::run_sampler(
        sampler,
        dispatcher.clone(),
        Duration::from_millis(config.relay.sample_period_ms),
    ));
    tokio::spawn(display::run_display_refresh(
        dispatcher.clone(),
        local_ui.clone(),
        Duration::from_millis(config.relay.display_refresh_ms),
    ));
    tokio::spawn(remote::run_current_publisher(
        dispatcher,
        remote_mirror,
        Duration::from_millis(config.relay.current_publish_ms),
    ));
    tokio::spawn(run_gesture_input(local_ui));

    info!("smart relay controller running");
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    info!("shutting down");
    Ok(())
}

/// Host input: one gesture per line on stdin. The board build wires the
/// touch controller to the same handler.
async fn run_gesture_input<P: Panel + 'static>(local_ui: Arc<LocalUiMirror<P>>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match line.trim().to_ascii_lowercase().as_str() {
                "l" | "light" => local_ui.handle_gesture(Gesture::LightToggle),
                "h" | "heater" => local_ui.handle_gesture(Gesture::HeaterToggle),
                "f" | "fan" => local_ui.handle_gesture(Gesture::FanStep),
                "" => {}
                other => warn!(other, "unknown gesture"),
            },
            Ok(None) => break,
            Err(err) => {
                warn!("gesture input error: {err}");
                break;
            }
        }
    }
}
