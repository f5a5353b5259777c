//! In-memory loopback transport.
//!
//! [`LoopbackDriver`] moves frames through channels instead of a network.
//! Its [`LoopbackPeer`] plays the remote end: it reads what the transport
//! wrote and can deliver data or hang up. Useful for tests and for running
//! the lifecycle without a server.

use tether_protocol::{Codec, Packet, PacketCodec, RawData};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::options::TransportOptions;
use crate::traits::{Driver, DriverHandle};

/// Loopback behaviour.
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Encode binary payloads as binary frames.
    pub supports_binary: bool,
    /// Fail every connect with this message.
    pub fail_connect: Option<String>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            supports_binary: true,
            fail_connect: None,
        }
    }
}

/// Driver half of a loopback pair.
pub struct LoopbackDriver {
    config: LoopbackConfig,
    codec: PacketCodec,
    outbound: mpsc::UnboundedSender<RawData>,
    handle: watch::Sender<Option<DriverHandle>>,
    connected: bool,
    connects: usize,
    disconnects: usize,
}

/// Remote half of a loopback pair.
#[derive(Debug)]
pub struct LoopbackPeer {
    outbound: mpsc::UnboundedReceiver<RawData>,
    handle: watch::Receiver<Option<DriverHandle>>,
}

impl LoopbackDriver {
    /// Create a connected driver/peer pair.
    #[must_use]
    pub fn pair(config: LoopbackConfig) -> (LoopbackDriver, LoopbackPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (handle, current) = watch::channel(None);

        let driver = LoopbackDriver {
            config,
            codec: PacketCodec::new(),
            outbound: tx,
            handle,
            connected: false,
            connects: 0,
            disconnects: 0,
        };
        let peer = LoopbackPeer {
            outbound: rx,
            handle: current,
        };
        (driver, peer)
    }

    /// Check whether the driver considers itself connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of times connect was called.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects
    }

    /// Number of times disconnect was called.
    #[must_use]
    pub fn disconnect_count(&self) -> usize {
        self.disconnects
    }
}

impl Driver for LoopbackDriver {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn connect(
        &mut self,
        options: &TransportOptions,
        handle: DriverHandle,
    ) -> Result<(), TransportError> {
        self.connects += 1;

        if let Some(reason) = &self.config.fail_connect {
            return Err(TransportError::transport(
                "loopback connect error",
                Some(reason.clone()),
            ));
        }

        debug!(host = %options.hostname, path = %options.path, "Loopback connecting");
        // Each open cycle comes with its own handle.
        self.handle.send_replace(Some(handle.clone()));
        self.connected = true;
        handle.opened();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.disconnects += 1;
        self.connected = false;
        self.handle.send_replace(None);
        Ok(())
    }

    fn write(&mut self, packets: Vec<Packet>) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::transport("loopback write error", Some("not connected".into())));
        }

        for packet in &packets {
            let raw = self.codec.encode(packet, self.config.supports_binary);
            trace!(packet_type = %packet.packet_type, bytes = raw.len(), "Loopback write");
            self.outbound.send(raw).map_err(|_| {
                TransportError::transport("loopback write error", Some("peer dropped".into()))
            })?;
        }
        Ok(())
    }
}

impl LoopbackPeer {
    /// Deliver raw data to the transport.
    ///
    /// Returns `false` if the driver is not connected or the transport is
    /// gone.
    pub fn deliver(&self, raw: impl Into<RawData>) -> bool {
        self.handle.borrow().as_ref().is_some_and(|h| h.data(raw))
    }

    /// Report a failure to the transport.
    pub fn fail(&self, message: impl Into<String>, description: Option<String>) -> bool {
        self.handle
            .borrow()
            .as_ref()
            .is_some_and(|h| h.error(message, description))
    }

    /// Close the connection from the remote side.
    pub fn hang_up(&self) -> bool {
        self.handle.borrow().as_ref().is_some_and(DriverHandle::closed)
    }

    /// Check whether the transport behind the current connection still
    /// takes signals.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.handle
            .borrow()
            .as_ref()
            .is_some_and(DriverHandle::is_connected)
    }

    /// Wait for the next frame written by the transport.
    pub async fn recv(&mut self) -> Option<RawData> {
        self.outbound.recv().await
    }

    /// Take the next written frame without waiting.
    pub fn try_recv(&mut self) -> Option<RawData> {
        self.outbound.try_recv().ok()
    }

    /// Send every written frame straight back to the transport.
    ///
    /// Returns the number of frames echoed.
    pub fn echo_pending(&mut self) -> usize {
        let mut echoed = 0;
        while let Ok(raw) = self.outbound.try_recv() {
            if self.deliver(raw) {
                echoed += 1;
            }
        }
        echoed
    }
}
