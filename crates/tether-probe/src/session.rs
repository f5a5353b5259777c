//! A single probe session.
//!
//! Opens a transport over the loopback driver, sends the configured
//! messages plus a ping, lets the peer echo them back, then closes.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tether_protocol::{Packet, PacketType, RawData};
use tether_transport::{
    LoopbackConfig, LoopbackDriver, LoopbackPeer, Scheme, Transport, TransportEvent,
};
use tracing::{debug, info, warn};

use crate::config::Config;

/// What happened during a session.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Target the transport would connect to.
    pub uri: String,
    /// Packets handed to the transport.
    pub sent: usize,
    /// Message packets received back.
    pub messages: usize,
    /// Pong packets received.
    pub pongs: usize,
    /// Error notifications.
    pub errors: usize,
    /// Whether the close notification was seen.
    pub closed: bool,
}

impl Summary {
    fn record(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::Packet(packet) => match packet.packet_type {
                PacketType::Message => self.messages += 1,
                PacketType::Pong => self.pongs += 1,
                other => debug!(packet_type = %other, "Unexpected packet"),
            },
            TransportEvent::Error(e) => {
                warn!(error = %e, description = ?e.description, "Transport error");
                self.errors += 1;
            }
            TransportEvent::Close => self.closed = true,
            TransportEvent::Open => {}
        }
    }
}

/// Run a probe session.
///
/// # Errors
///
/// Returns an error if the transport does not open or a signal times out.
pub async fn run(config: &Config) -> Result<Summary> {
    let loopback = LoopbackConfig {
        supports_binary: config.supports_binary,
        ..Default::default()
    };
    let (driver, mut peer) = LoopbackDriver::pair(loopback);
    let mut transport = Transport::new(config.transport_options(), driver);
    let mut events = transport.subscribe();

    let mut summary = Summary {
        uri: transport.options().uri(Scheme::Ws),
        ..Default::default()
    };
    info!(transport = transport.name(), uri = %summary.uri, "Opening transport");

    transport.open();
    wait_for_signal(&mut transport, config).await?;
    match events.try_recv() {
        Some(TransportEvent::Open) => debug!("Transport open"),
        Some(TransportEvent::Error(e)) => bail!("Transport failed to open: {e}"),
        other => bail!("Expected open event, got {other:?}"),
    }

    let mut packets: Vec<Packet> = config
        .messages
        .iter()
        .map(|m| {
            if config.binary {
                Packet::message(m.as_bytes().to_vec())
            } else {
                Packet::message(m.as_str())
            }
        })
        .collect();
    packets.push(Packet::ping());
    summary.sent = packets.len();
    transport.send(packets).context("Failed to send packets")?;

    let echoed = reply(&mut peer);
    for _ in 0..echoed {
        wait_for_signal(&mut transport, config).await?;
    }

    transport.close();

    for event in events.drain() {
        if let TransportEvent::Packet(packet) = &event {
            info!(packet_type = %packet.packet_type, payload = ?packet.payload, "Received packet");
        }
        summary.record(&event);
    }

    Ok(summary)
}

/// Echo messages back and answer pings with pongs.
///
/// Returns the number of frames delivered to the transport.
fn reply(peer: &mut LoopbackPeer) -> usize {
    let mut delivered = 0;
    while let Some(raw) = peer.try_recv() {
        let response = match &raw {
            RawData::Text(text) if text == "2" => RawData::from("3"),
            _ => raw,
        };
        if peer.deliver(response) {
            delivered += 1;
        }
    }
    delivered
}

async fn wait_for_signal(
    transport: &mut Transport<LoopbackDriver>,
    config: &Config,
) -> Result<()> {
    tokio::time::timeout(config.timeout(), transport.next_signal())
        .await
        .context("Timed out waiting for transport signal")?
        .context("Transport signal channel closed")?;
    Ok(())
}
