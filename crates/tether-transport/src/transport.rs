//! The transport lifecycle.
//!
//! [`Transport`] drives a [`Driver`] through one connection attempt:
//!
//! ```text
//! unopened ──open()──▶ opening ──opened──▶ open
//!    ▲                    │                  │
//!    │                    └──close()──┬──────┘
//! closed ◀──disconnect────── closing ◀┘
//! ```
//!
//! Inbound data is decoded with the injected [`Codec`] and surfaced as
//! `Packet` events; every failure becomes exactly one `Error` event. The
//! transport never closes itself on error, that decision belongs to the
//! owner.

use std::sync::Arc;
use tether_protocol::{Codec, Packet, PacketCodec, RawData};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{TransportError, UsageError};
use crate::events::{Listener, ListenerId, Notifier, TransportEvent};
use crate::metrics;
use crate::options::TransportOptions;
use crate::state::{ReadyState, Trigger};
use crate::traits::{Driver, DriverHandle, DriverSignal};

/// A transport bound to one driver.
///
/// All methods take `&mut self`: a transport has a single owner and is not
/// meant to be shared between independent callers.
pub struct Transport<D: Driver> {
    options: TransportOptions,
    driver: D,
    codec: Arc<dyn Codec>,
    ready_state: ReadyState,
    writable: bool,
    notifier: Notifier,
    handle: DriverHandle,
    signals: mpsc::UnboundedReceiver<DriverSignal>,
}

impl<D: Driver> Transport<D> {
    /// Create a transport using the default packet codec.
    #[must_use]
    pub fn new(options: TransportOptions, driver: D) -> Self {
        Self::with_codec(options, driver, Arc::new(PacketCodec::new()))
    }

    /// Create a transport with a custom codec.
    #[must_use]
    pub fn with_codec(options: TransportOptions, driver: D, codec: Arc<dyn Codec>) -> Self {
        let (tx, signals) = mpsc::unbounded_channel();
        Self {
            options,
            driver,
            codec,
            ready_state: ReadyState::Unopened,
            writable: false,
            notifier: Notifier::new(),
            handle: DriverHandle::new(tx),
            signals,
        }
    }

    /// Get the transport name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.driver.name()
    }

    /// Get the options this transport was built with.
    #[must_use]
    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Get the current ready state.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// Check whether the driver can take more packets.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Set writability, for drivers applying backpressure.
    ///
    /// Has no effect unless the transport is open.
    pub fn set_writable(&mut self, writable: bool) {
        if self.ready_state == ReadyState::Open {
            self.writable = writable;
        }
    }

    /// Get the driver.
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get the driver mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Get a handle for reporting driver signals.
    ///
    /// Each `open` starts a fresh signal channel; handles from an earlier
    /// cycle stop delivering once the transport reopens.
    #[must_use]
    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// Register a listener for transport events.
    pub fn subscribe(&mut self) -> Listener {
        self.notifier.subscribe()
    }

    /// Remove a listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Open the transport.
    ///
    /// Only acts when the transport is unopened or closed; otherwise this
    /// is a no-op. Completion is reported by an `Open` event.
    pub fn open(&mut self) -> &mut Self {
        let Ok(next) = self.ready_state.transition(Trigger::Open) else {
            trace!(transport = self.name(), state = %self.ready_state, "Ignoring open");
            return self;
        };

        debug!(transport = self.name(), from = %self.ready_state, "Opening transport");
        self.ready_state = next;
        self.notifier.reset();

        // Drops the previous receiver along with anything still queued on it.
        let (tx, signals) = mpsc::unbounded_channel();
        self.handle = DriverHandle::new(tx);
        self.signals = signals;

        if let Err(e) = self.driver.connect(&self.options, self.handle.clone()) {
            self.emit_error(e);
        }
        self
    }

    /// Close the transport.
    ///
    /// Only acts while opening or open; otherwise this is a no-op. Closing
    /// while opening cancels the connect.
    pub fn close(&mut self) -> &mut Self {
        let Ok(next) = self.ready_state.transition(Trigger::Close) else {
            trace!(transport = self.name(), state = %self.ready_state, "Ignoring close");
            return self;
        };

        debug!(transport = self.name(), from = %self.ready_state, "Closing transport");
        self.ready_state = next;
        self.writable = false;

        if let Err(e) = self.driver.disconnect() {
            self.emit_error(e);
        }
        self.on_close();
        self
    }

    /// Send packets.
    ///
    /// The whole sequence is handed to the driver in order. A driver
    /// failure is reported as an `Error` event.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NotOpen`] if the transport is not open; the
    /// driver is not called.
    pub fn send(&mut self, packets: Vec<Packet>) -> Result<(), UsageError> {
        if self.ready_state != ReadyState::Open {
            return Err(UsageError::NotOpen(self.ready_state));
        }

        let count = packets.len();
        trace!(transport = self.name(), count, "Writing packets");
        match self.driver.write(packets) {
            Ok(()) => metrics::record_sent(self.name(), count),
            Err(e) => {
                self.emit_error(e);
            }
        }
        Ok(())
    }

    /// Mark the connect as complete.
    ///
    /// Ignored unless the transport is opening, e.g. when the connect
    /// finishes after the owner already closed.
    pub fn on_open(&mut self) {
        let Ok(next) = self.ready_state.transition(Trigger::Opened) else {
            warn!(transport = self.name(), state = %self.ready_state, "Ignoring late open");
            return;
        };

        debug!(transport = self.name(), "Transport open");
        self.ready_state = next;
        self.writable = true;
        metrics::record_open(self.name());
        self.notifier.publish(TransportEvent::Open);
    }

    /// Decode inbound data and forward the packet.
    ///
    /// Decode failures become a `Decode` error and leave the state alone.
    /// Packets are only forwarded while open, so `Open` always precedes
    /// them; a well-formed packet arriving in any other state is reported
    /// as a `Transport` error instead.
    pub fn on_data(&mut self, raw: RawData) {
        let binary_type = self.options.context.binary_type();
        let packet = match self.codec.decode(&raw, binary_type) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(transport = self.name(), error = %e, "Failed to decode packet");
                self.emit_error(TransportError::decode(&e));
                return;
            }
        };

        if !self.ready_state.accepts_data() {
            warn!(
                transport = self.name(),
                state = %self.ready_state,
                packet_type = %packet.packet_type,
                "Packet outside an open session"
            );
            self.emit_error(TransportError::transport(
                "packet outside open session",
                Some(format!("state: {}", self.ready_state)),
            ));
            return;
        }

        trace!(transport = self.name(), packet_type = %packet.packet_type, "Decoded packet");
        self.on_packet(packet);
    }

    /// Forward a decoded packet to listeners.
    pub fn on_packet(&mut self, packet: Packet) {
        metrics::record_received(self.name());
        self.notifier.publish(TransportEvent::Packet(packet));
    }

    /// Report a transport failure.
    ///
    /// The state is left unchanged.
    pub fn on_error(
        &mut self,
        message: impl Into<String>,
        description: Option<String>,
    ) -> &mut Self {
        self.emit_error(TransportError::transport(message, description));
        self
    }

    /// Mark the connection as gone.
    ///
    /// Called by `close` after the driver disconnected, or through a
    /// `Closed` signal when the remote end hung up.
    pub fn on_close(&mut self) {
        let Ok(next) = self.ready_state.transition(Trigger::Closed) else {
            trace!(transport = self.name(), state = %self.ready_state, "Ignoring close signal");
            return;
        };

        debug!(transport = self.name(), "Transport closed");
        self.ready_state = next;
        self.writable = false;
        metrics::record_close(self.name());
        self.notifier.publish(TransportEvent::Close);
    }

    /// Apply every signal queued by the driver.
    ///
    /// Returns the number of signals applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(signal) = self.signals.try_recv() {
            self.apply(signal);
            applied += 1;
        }
        applied
    }

    /// Wait for the next driver signal and apply it.
    ///
    /// The transport keeps a handle of its own, so this only returns once
    /// a signal arrives; race it against a timeout or shutdown if needed.
    pub async fn next_signal(&mut self) -> Option<DriverSignal> {
        let signal = self.signals.recv().await?;
        self.apply(signal.clone());
        Some(signal)
    }

    fn apply(&mut self, signal: DriverSignal) {
        match signal {
            DriverSignal::Opened => self.on_open(),
            DriverSignal::Data(raw) => self.on_data(raw),
            DriverSignal::Error {
                message,
                description,
            } => {
                self.on_error(message, description);
            }
            DriverSignal::Closed => self.on_close(),
        }
    }

    fn emit_error(&mut self, error: TransportError) {
        metrics::record_error(self.name(), error.kind);
        if self.notifier.is_sealed() {
            warn!(
                transport = self.name(),
                error = %error,
                description = error.description.as_deref().unwrap_or(""),
                "Error after close"
            );
            return;
        }
        debug!(transport = self.name(), error = %error, "Transport error");
        self.notifier.publish(TransportEvent::Error(error));
    }
}

impl<D: Driver> std::fmt::Debug for Transport<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("name", &self.name())
            .field("ready_state", &self.ready_state)
            .field("writable", &self.writable)
            .field("listeners", &self.notifier.listener_count())
            .finish()
    }
}
