//! # tether-protocol
//!
//! Packet definitions and the packet codec for the Tether realtime client.
//!
//! Transports move raw frames; this crate turns those frames into typed
//! packets and back.
//!
//! ## Packet Types
//!
//! - `Open` / `Close` - Session handshake and teardown
//! - `Ping` / `Pong` - Heartbeats
//! - `Message` - Application data
//! - `Upgrade` / `Noop` - Transport upgrade coordination
//!
//! ## Example
//!
//! ```rust
//! use tether_protocol::{codec, BinaryType, Packet};
//!
//! let packet = Packet::message("Hello, world!");
//!
//! let raw = codec::encode(&packet, true);
//! let decoded = codec::decode(&raw, BinaryType::Bytes).unwrap();
//! assert_eq!(packet, decoded);
//! ```

pub mod codec;
pub mod packet;

pub use codec::{decode, encode, BinaryType, Codec, PacketCodec, ProtocolError, RawData};
pub use packet::{Packet, PacketType, Payload};
