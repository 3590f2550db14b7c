//! Remote mirror: the cloud topic set over MQTT.
//!
//! Outbound pushes are fire-and-forget: `on_change` encodes and enqueues,
//! a publisher task owns the actual network sends, and the registry never
//! waits for an acknowledgement. Inbound publishes are decoded and handed
//! to the dispatcher tagged with the remote origin, so the committed change
//! is never reflected back to the broker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_common::{codec, topics, ChannelValue, LoadChannel, Origin};
use rumqttc::{AsyncClient, Event, Incoming, QoS};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch::{ChangeRequest, Dispatcher, Mirror, RequestSender};

pub type PublishSender = mpsc::UnboundedSender<(String, Vec<u8>)>;
pub type PublishReceiver = mpsc::UnboundedReceiver<(String, Vec<u8>)>;

pub fn publish_queue() -> (PublishSender, PublishReceiver) {
    mpsc::unbounded_channel()
}

pub struct RemoteMirror {
    /// What the broker currently shows per channel. Reconciled from both
    /// directions: outbound publishes and decoded inbound commands.
    last_sent: Mutex<HashMap<LoadChannel, ChannelValue>>,
    publishes: PublishSender,
    requests: RequestSender,
}

impl RemoteMirror {
    pub fn new(publishes: PublishSender, requests: RequestSender) -> Self {
        Self {
            last_sent: Mutex::new(HashMap::new()),
            publishes,
            requests,
        }
    }

    /// Handles one inbound broker publish.
    ///
    /// Decode failures drop the message without touching any state; a
    /// clamped fan level is a warning, not a fault.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        match codec::decode(topic, payload) {
            Ok(Some(command)) => {
                if command.clamped {
                    warn!(topic, value = %command.value, "fan level out of range, clamped");
                }
                // The broker already shows this value; remember it so the
                // committed change is not published back.
                self.last_sent
                    .lock()
                    .unwrap()
                    .insert(command.channel, command.value);

                let request = ChangeRequest {
                    channel: command.channel,
                    value: command.value,
                    origin: Origin::Remote,
                };
                if self.requests.send(request).is_err() {
                    warn!(topic, "dispatcher gone, dropping remote command");
                }
            }
            Ok(None) => debug!(topic, "ignoring meaningless payload"),
            Err(err) => warn!("dropping remote message: {err}"),
        }
    }

    /// Pushes the latest current reading on its output-only topic.
    pub fn publish_current(&self, milliamps: u32) {
        let payload = codec::encode_current(milliamps).into_bytes();
        if self
            .publishes
            .send((topics::TOPIC_CURRENT.to_string(), payload))
            .is_err()
        {
            warn!("publish queue closed, dropping current reading");
        }
    }
}

impl Mirror for RemoteMirror {
    fn on_change(&self, channel: LoadChannel, value: ChannelValue) {
        {
            let mut last_sent = self.last_sent.lock().unwrap();
            if last_sent.get(&channel) == Some(&value) {
                debug!(%channel, "broker already current, skipping publish");
                return;
            }
            last_sent.insert(channel, value);
        }

        let payload = codec::encode(value).to_vec();
        if self
            .publishes
            .send((topics::topic_for(channel).to_string(), payload))
            .is_err()
        {
            warn!(%channel, "publish queue closed, dropping update");
        }
    }
}

/// Subscribes to every command topic.
pub async fn subscribe_topics(client: &AsyncClient) -> anyhow::Result<()> {
    for (topic, _) in topics::CHANNEL_TOPICS {
        client.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

/// MQTT event loop task: feeds inbound publishes to the mirror and backs
/// off briefly on poll errors so a flapping broker cannot spin the task.
pub async fn run_event_loop(remote: Arc<RemoteMirror>, mut eventloop: rumqttc::EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(message))) => {
                remote.handle_message(&message.topic, &message.payload);
            }
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("mqtt connected");
            }
            Ok(_) => {}
            Err(err) => {
                warn!("mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

/// Publisher task: drains the fire-and-forget queue into the client.
pub async fn run_publisher(client: AsyncClient, mut publishes: PublishReceiver) {
    while let Some((topic, payload)) = publishes.recv().await {
        if let Err(err) = client.publish(topic.clone(), QoS::AtLeastOnce, false, payload).await {
            warn!(%topic, "publish failed: {err}");
        }
    }
}

/// Pushes the current reading outward on its own timer, independent of the
/// sampling period.
pub async fn run_current_publisher(
    dispatcher: Arc<Dispatcher>,
    remote: Arc<RemoteMirror>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let reading = dispatcher.latest_current().await;
        remote.publish_current(reading.milliamps);
    }
}
