//! UDP client: one socket for commands, polls and replies.

use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use hearthlink_app::bridge::InboundUpdate;
use hearthlink_app::ports::TransportClient;
use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::error::BridgeError;
use hearthlink_domain::payload::LanPayload;

use crate::config::LanConfig;
use crate::error::LanError;
use crate::message;

/// Largest datagram a device sends.
const MAX_DATAGRAM: usize = 2048;

/// Local-network transport client.
pub struct LanClient {
    socket: UdpSocket,
    config: LanConfig,
}

impl LanClient {
    /// Bind the reply socket.
    ///
    /// # Errors
    ///
    /// Returns [`LanError::Io`] when the listen port cannot be bound.
    pub async fn bind(config: LanConfig) -> Result<Self, LanError> {
        let socket = UdpSocket::bind((config.bind_address, config.listen_port)).await?;
        tracing::info!(address = %socket.local_addr()?, "local network client bound");
        Ok(Self { socket, config })
    }

    /// Address the reply socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`LanError::Io`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, LanError> {
        Ok(self.socket.local_addr()?)
    }

    #[must_use]
    pub fn config(&self) -> &LanConfig {
        &self.config
    }

    /// Multicast a discovery request; devices answer on the listen port.
    ///
    /// # Errors
    ///
    /// Returns [`LanError::Io`] when the datagram cannot be sent.
    pub async fn scan(&self) -> Result<(), LanError> {
        let target = (self.config.multicast_address, self.config.scan_port);
        self.socket.send_to(&message::scan_request()?, target).await?;
        tracing::debug!("local network scan sent");
        Ok(())
    }

    /// Ask the device at `ip` for its state.
    ///
    /// # Errors
    ///
    /// Returns [`LanError::Io`] when the datagram cannot be sent.
    pub async fn request_status(&self, ip: IpAddr) -> Result<(), LanError> {
        self.socket
            .send_to(&message::status_request()?, (ip, self.config.command_port))
            .await?;
        Ok(())
    }

    /// Poll every device using the local transport.
    pub async fn refresh(&self, devices: &[DeviceRecord]) {
        for device in devices.iter().filter(|device| device.uses(Transport::Lan)) {
            let Some(ip) = device.lan_address else {
                continue;
            };
            if let Err(err) = self.request_status(ip).await {
                tracing::warn!(device = %device.id, %ip, %err, "local status request failed");
            }
        }
    }

    /// Send `payload` to `device`.
    ///
    /// # Errors
    ///
    /// Returns [`LanError::MissingAddress`] when the device has no known
    /// address, or [`LanError::Io`] when the datagram cannot be sent.
    pub async fn send_command(
        &self,
        device: &DeviceRecord,
        payload: &LanPayload,
    ) -> Result<(), LanError> {
        let ip = device.lan_address.ok_or(LanError::MissingAddress)?;
        self.socket
            .send_to(&message::command(payload)?, (ip, self.config.command_port))
            .await?;
        tracing::debug!(device = %device.id, %ip, cmd = %payload.cmd, "local command sent");
        Ok(())
    }

    /// Receive replies and push them onto `inbound` until the channel
    /// closes.
    ///
    /// # Errors
    ///
    /// Returns [`LanError::Io`] when the socket fails.
    pub async fn listen(&self, inbound: mpsc::Sender<InboundUpdate>) -> Result<(), LanError> {
        let mut buf = vec![0_u8; MAX_DATAGRAM];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            match message::parse_reply(&buf[..len], from.ip()) {
                Ok(Some(update)) => {
                    if inbound.send(update).await.is_err() {
                        tracing::debug!("inbound channel closed, stopping local listener");
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::debug!(%from, %err, "ignoring malformed datagram"),
            }
        }
    }
}

impl TransportClient for LanClient {
    type Payload = LanPayload;

    fn transport(&self) -> Transport {
        Transport::Lan
    }

    async fn update_device(
        &self,
        device: &DeviceRecord,
        payload: &LanPayload,
    ) -> Result<(), BridgeError> {
        self.send_command(device, payload)
            .await
            .map_err(LanError::into_domain)
    }
}
