//! # tether-transport
//!
//! Transport abstraction layer for the Tether realtime client.
//!
//! Every concrete transport (long-polling, WebSocket, …) plugs a
//! [`Driver`] into the same [`Transport`] state machine, so the client can
//! swap or upgrade transports without caring which one is active.
//!
//! - **Transport** - Lifecycle state machine and packet pipeline
//! - **Driver** - Network mechanics supplied by concrete transports
//! - **Notifier** - Open / packet / error / close notifications
//! - **Loopback** - In-memory driver for tests and local runs
//!
//! ## Transport Abstraction
//!
//! ```rust,ignore
//! use tether_transport::{Transport, TransportEvent, TransportOptions};
//!
//! async fn run(driver: impl tether_transport::Driver) {
//!     let mut transport = Transport::new(TransportOptions::new("example.com", 80, "/rt"), driver);
//!     let mut events = transport.subscribe();
//!
//!     transport.open();
//!     while transport.next_signal().await.is_some() {
//!         while let Some(event) = events.try_recv() {
//!             // Handle event
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod events;
pub mod metrics;
pub mod options;
pub mod state;
pub mod traits;
pub mod transport;

#[cfg(feature = "loopback")]
pub mod loopback;

pub use error::{ErrorKind, TransportError, UsageError};
pub use events::{Listener, ListenerId, Notifier, TransportEvent};
pub use options::{ConnectionContext, OptionsError, Scheme, TlsOptions, TransportOptions};
pub use state::{InvalidTransition, ReadyState, Trigger};
pub use traits::{Driver, DriverHandle, DriverSignal};
pub use transport::Transport;

#[cfg(feature = "loopback")]
pub use loopback::{LoopbackConfig, LoopbackDriver, LoopbackPeer};

pub use tether_protocol::{BinaryType, Packet, PacketType, Payload, RawData};
