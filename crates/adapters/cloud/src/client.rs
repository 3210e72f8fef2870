//! MQTT client publishing device commands and forwarding account messages.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hearthlink_app::bridge::InboundUpdate;
use hearthlink_app::ports::TransportClient;
use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::error::BridgeError;
use hearthlink_domain::payload::CloudPayload;
use hearthlink_domain::time;

use crate::config::CloudConfig;
use crate::error::CloudError;
use crate::message;

/// Outstanding requests buffered between the client and its event loop.
const REQUEST_CAPACITY: usize = 32;

fn mqtt_options(config: &CloudConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(config.keep_alive());
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }
    if config.tls {
        options.set_transport(rumqttc::Transport::tls_with_default_config());
    }
    options
}

/// Cloud transport client.
///
/// Cheap to share behind an `Arc`; the connection itself is driven by the
/// event loop task returned from [`CloudClient::connect`].
pub struct CloudClient {
    client: AsyncClient,
    account_topic: Option<String>,
}

impl CloudClient {
    /// Create the client and spawn its event loop.
    ///
    /// Account messages are decoded and pushed onto `inbound`. The returned
    /// handle owns the connection; abort it to disconnect.
    #[must_use]
    pub fn connect(
        config: &CloudConfig,
        inbound: mpsc::Sender<InboundUpdate>,
    ) -> (Self, JoinHandle<()>) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
        let handle = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            config.account_topic.clone(),
            config.reconnect_delay(),
            inbound,
        ));
        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            "cloud client started"
        );

        (Self::new(client, config.account_topic.clone()), handle)
    }

    pub(crate) fn new(client: AsyncClient, account_topic: Option<String>) -> Self {
        Self { client, account_topic }
    }

    /// Publish `payload` on the device topic.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::MissingTopic`] when the device has no cloud
    /// topic, or the client's error when the message cannot be queued.
    pub async fn send_command(
        &self,
        device: &DeviceRecord,
        payload: &CloudPayload,
    ) -> Result<(), CloudError> {
        let topic = device.cloud_topic.as_deref().ok_or(CloudError::MissingTopic)?;
        let transaction = message::transaction_id(time::now());
        let bytes = message::command(payload, &transaction, self.account_topic.as_deref())?;
        self.publish(topic, bytes).await?;
        tracing::debug!(
            device = %device.id,
            cmd = %payload.cmd,
            %transaction,
            "cloud command published"
        );
        Ok(())
    }

    /// Ask the device to publish its status on the account topic.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::MissingTopic`] when the device has no cloud
    /// topic, or the client's error when the request cannot be queued.
    pub async fn request_update(&self, device: &DeviceRecord) -> Result<(), CloudError> {
        let topic = device.cloud_topic.as_deref().ok_or(CloudError::MissingTopic)?;
        let transaction = message::transaction_id(time::now());
        let bytes = message::status_request(&transaction, self.account_topic.as_deref())?;
        self.publish(topic, bytes).await
    }

    /// Request a status update from every device using the cloud transport.
    pub async fn refresh(&self, devices: &[DeviceRecord]) {
        for device in devices.iter().filter(|device| device.uses(Transport::Cloud)) {
            if let Err(err) = self.request_update(device).await {
                tracing::warn!(device = %device.id, %err, "cloud status request failed");
            }
        }
    }

    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<(), CloudError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(CloudError::Client)
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    account_topic: Option<String>,
    reconnect_delay: Duration,
    inbound: mpsc::Sender<InboundUpdate>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("connected to cloud broker");
                // This task drains the request queue, so it must not wait on it.
                if let Some(topic) = &account_topic
                    && let Err(err) = client.try_subscribe(topic, QoS::AtLeastOnce)
                {
                    tracing::warn!(%err, %topic, "failed to subscribe to account topic");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match message::parse_incoming(&publish.payload) {
                    Ok(Some(update)) => {
                        if inbound.send(update).await.is_err() {
                            tracing::debug!("inbound channel closed, stopping cloud event loop");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::debug!(%err, topic = %publish.topic, "ignoring cloud message");
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(%err, "cloud connection error, retrying");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

impl TransportClient for CloudClient {
    type Payload = CloudPayload;

    fn transport(&self) -> Transport {
        Transport::Cloud
    }

    async fn update_device(
        &self,
        device: &DeviceRecord,
        payload: &CloudPayload,
    ) -> Result<(), BridgeError> {
        self.send_command(device, payload)
            .await
            .map_err(CloudError::into_domain)
    }
}
