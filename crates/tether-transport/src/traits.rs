//! Driver contract for concrete transports.
//!
//! A [`Driver`] supplies the network mechanics (polling requests, a socket,
//! an in-memory pipe) while [`Transport`](crate::Transport) owns the
//! lifecycle. Drivers report asynchronous outcomes through a
//! [`DriverHandle`]; the transport's owner applies them in arrival order.

use tether_protocol::{Packet, RawData};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::options::TransportOptions;

/// Network mechanics behind a transport.
///
/// All methods are called by the transport from its owner's control flow
/// and must return without blocking on the network.
pub trait Driver: Send {
    /// Get the transport name (e.g., "polling", "websocket").
    fn name(&self) -> &'static str;

    /// Start connecting.
    ///
    /// On success the driver must eventually call [`DriverHandle::opened`].
    /// Failures discovered later go through [`DriverHandle::error`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot even be started.
    fn connect(
        &mut self,
        options: &TransportOptions,
        handle: DriverHandle,
    ) -> Result<(), TransportError>;

    /// Tear down the connection.
    ///
    /// Must be safe to call before the connection finished opening.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the underlying resource failed.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Transmit packets in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the packets could not be handed to the network.
    fn write(&mut self, packets: Vec<Packet>) -> Result<(), TransportError>;
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn connect(
        &mut self,
        options: &TransportOptions,
        handle: DriverHandle,
    ) -> Result<(), TransportError> {
        (**self).connect(options, handle)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        (**self).disconnect()
    }

    fn write(&mut self, packets: Vec<Packet>) -> Result<(), TransportError> {
        (**self).write(packets)
    }
}

/// An asynchronous outcome reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSignal {
    /// Connect finished.
    Opened,
    /// Raw data arrived.
    Data(RawData),
    /// Something failed.
    Error {
        /// Human-readable message.
        message: String,
        /// Optional detail.
        description: Option<String>,
    },
    /// The remote end closed the connection.
    Closed,
}

/// Cloneable sender drivers use to report back to their transport.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::UnboundedSender<DriverSignal>,
}

impl DriverHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<DriverSignal>) -> Self {
        Self { tx }
    }

    /// Report a completed connect.
    ///
    /// Returns `false` if the transport is gone.
    pub fn opened(&self) -> bool {
        self.signal(DriverSignal::Opened)
    }

    /// Report inbound raw data.
    pub fn data(&self, raw: impl Into<RawData>) -> bool {
        self.signal(DriverSignal::Data(raw.into()))
    }

    /// Report a failure.
    pub fn error(&self, message: impl Into<String>, description: Option<String>) -> bool {
        self.signal(DriverSignal::Error {
            message: message.into(),
            description,
        })
    }

    /// Report that the remote end closed.
    pub fn closed(&self) -> bool {
        self.signal(DriverSignal::Closed)
    }

    /// Send an arbitrary signal.
    pub fn signal(&self, signal: DriverSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    /// Check whether the transport still takes signals from this handle.
    ///
    /// Turns `false` once the transport is dropped or reopened.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}
