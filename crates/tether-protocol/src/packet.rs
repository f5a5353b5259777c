//! Packet types for the Tether protocol.
//!
//! A packet is the unit a transport moves: a type tag plus an optional
//! payload. Packets are plain values and never change once decoded.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Packet type identifiers.
///
/// The discriminant is the value used on the wire, both as a raw byte in
/// binary frames and as an ASCII digit in text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PacketType {
    /// Session handshake from the server.
    Open = 0,
    /// Request to close the session.
    Close = 1,
    /// Liveness probe.
    Ping = 2,
    /// Reply to a ping.
    Pong = 3,
    /// Application data.
    Message = 4,
    /// Switch to another transport.
    Upgrade = 5,
    /// No operation, used to flush a pending poll.
    Noop = 6,
}

impl PacketType {
    /// Every packet type, in wire order.
    pub const ALL: [PacketType; 7] = [
        PacketType::Open,
        PacketType::Close,
        PacketType::Ping,
        PacketType::Pong,
        PacketType::Message,
        PacketType::Upgrade,
        PacketType::Noop,
    ];

    /// Get the lowercase name of this packet type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PacketType::Open => "open",
            PacketType::Close => "close",
            PacketType::Ping => "ping",
            PacketType::Pong => "pong",
            PacketType::Message => "message",
            PacketType::Upgrade => "upgrade",
            PacketType::Noop => "noop",
        }
    }

    /// Get the ASCII digit used for this type in text frames.
    #[must_use]
    pub fn as_char(self) -> char {
        char::from(b'0' + self as u8)
    }

    /// Parse a packet type from its text-frame digit.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        c.to_digit(10)
            .and_then(|d| u8::try_from(d).ok())
            .and_then(|d| PacketType::try_from(d).ok())
    }
}

impl From<PacketType> for u8 {
    fn from(pt: PacketType) -> u8 {
        pt as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Open),
            1 => Ok(PacketType::Close),
            2 => Ok(PacketType::Ping),
            3 => Ok(PacketType::Pong),
            4 => Ok(PacketType::Message),
            5 => Ok(PacketType::Upgrade),
            6 => Ok(PacketType::Noop),
            _ => Err("Invalid packet type"),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// Raw binary data.
    Binary(Bytes),
    /// Binary data kept in its base64 text form.
    Base64(String),
}

impl Payload {
    /// Check whether the payload carries binary data.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        !matches!(self, Payload::Text(_))
    }

    /// Get the payload as text, if it is a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Size of the payload in bytes as held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) | Payload::Base64(s) => s.len(),
            Payload::Binary(b) => b.len(),
        }
    }

    /// Check whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Binary(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(v))
    }
}

/// A protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet type.
    pub packet_type: PacketType,
    /// Optional payload.
    pub payload: Option<Payload>,
}

impl Packet {
    /// Create a packet without payload.
    #[must_use]
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            payload: None,
        }
    }

    /// Create a packet carrying a payload.
    #[must_use]
    pub fn with_payload(packet_type: PacketType, payload: impl Into<Payload>) -> Self {
        Self {
            packet_type,
            payload: Some(payload.into()),
        }
    }

    /// Create a new Message packet.
    #[must_use]
    pub fn message(payload: impl Into<Payload>) -> Self {
        Self::with_payload(PacketType::Message, payload)
    }

    /// Create a new Ping packet.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(PacketType::Ping)
    }

    /// Create a new Pong packet.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(PacketType::Pong)
    }

    /// Create a new Close packet.
    #[must_use]
    pub fn close() -> Self {
        Self::new(PacketType::Close)
    }

    /// Create a new Upgrade packet.
    #[must_use]
    pub fn upgrade() -> Self {
        Self::new(PacketType::Upgrade)
    }

    /// Create a new Noop packet.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(PacketType::Noop)
    }

    /// Get the payload as text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.payload.as_ref().and_then(Payload::as_text)
    }
}
