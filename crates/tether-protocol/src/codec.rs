//! Codec for encoding and decoding Tether packets.
//!
//! Packets travel in one of two shapes:
//!
//! - text frames: `<type digit><utf-8 payload>`, e.g. `4hello`
//! - binary frames: `[type byte][payload bytes]`
//!
//! Binary payloads sent to a peer that cannot take binary frames are
//! carried as text with a `b` marker: `b<type digit><base64 payload>`.
//!
//! An empty text payload is indistinguishable from no payload on the wire:
//! `Packet::message("")` encodes to `4` and decodes with `payload: None`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::packet::{Packet, PacketType, Payload};

/// Marker prefix for base64-encoded binary packets in text frames.
pub const BASE64_MARKER: char = 'b';

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Nothing to decode.
    #[error("Empty packet")]
    Empty,

    /// The type tag is not a known packet type.
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(String),

    /// Base64 payload could not be decoded.
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Text frame bytes are not valid UTF-8.
    #[error("Invalid UTF-8 in text frame: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Raw data as it moves over a transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawData {
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Bytes),
}

impl RawData {
    /// Build a text frame from bytes received off the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid UTF-8.
    pub fn text_from_bytes(bytes: Vec<u8>) -> Result<Self, ProtocolError> {
        Ok(RawData::Text(String::from_utf8(bytes)?))
    }

    /// Length of the frame in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RawData::Text(s) => s.len(),
            RawData::Binary(b) => b.len(),
        }
    }

    /// Check whether the frame is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for RawData {
    fn from(s: &str) -> Self {
        RawData::Text(s.to_string())
    }
}

impl From<String> for RawData {
    fn from(s: String) -> Self {
        RawData::Text(s)
    }
}

impl From<Bytes> for RawData {
    fn from(b: Bytes) -> Self {
        RawData::Binary(b)
    }
}

/// How decoded binary payloads are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BinaryType {
    /// Binary payloads become [`Payload::Binary`].
    #[default]
    Bytes = 0,
    /// Binary payloads stay base64 text in [`Payload::Base64`].
    Base64 = 1,
}

impl From<BinaryType> for u8 {
    fn from(bt: BinaryType) -> u8 {
        bt as u8
    }
}

impl TryFrom<u8> for BinaryType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BinaryType::Bytes),
            1 => Ok(BinaryType::Base64),
            _ => Err("Invalid binary type"),
        }
    }
}

/// Encode a packet into a raw frame.
///
/// When `supports_binary` is false, binary payloads are base64-encoded
/// into a text frame.
#[must_use]
pub fn encode(packet: &Packet, supports_binary: bool) -> RawData {
    let tag = packet.packet_type.as_char();

    match &packet.payload {
        None => RawData::Text(tag.to_string()),
        Some(Payload::Text(text)) => {
            let mut out = String::with_capacity(1 + text.len());
            out.push(tag);
            out.push_str(text);
            RawData::Text(out)
        }
        Some(Payload::Binary(data)) if supports_binary => {
            let mut buf = BytesMut::with_capacity(1 + data.len());
            buf.put_u8(packet.packet_type.into());
            buf.extend_from_slice(data);
            RawData::Binary(buf.freeze())
        }
        Some(Payload::Binary(data)) => {
            RawData::Text(format!("{BASE64_MARKER}{tag}{}", STANDARD.encode(data)))
        }
        Some(Payload::Base64(encoded)) => RawData::Text(format!("{BASE64_MARKER}{tag}{encoded}")),
    }
}

/// Decode a raw frame into a packet.
///
/// # Errors
///
/// Returns an error if the frame is empty, carries an unknown type tag,
/// or holds a malformed base64 payload.
pub fn decode(raw: &RawData, binary_type: BinaryType) -> Result<Packet, ProtocolError> {
    match raw {
        RawData::Text(text) => decode_text(text, binary_type),
        RawData::Binary(data) => decode_binary(data, binary_type),
    }
}

fn decode_text(text: &str, binary_type: BinaryType) -> Result<Packet, ProtocolError> {
    let mut chars = text.chars();
    let first = chars.next().ok_or(ProtocolError::Empty)?;

    if first == BASE64_MARKER {
        let tag = chars.next().ok_or(ProtocolError::Empty)?;
        let packet_type = parse_tag(tag)?;
        let encoded = chars.as_str();
        let data = STANDARD.decode(encoded)?;
        let payload = match binary_type {
            BinaryType::Bytes => Payload::Binary(Bytes::from(data)),
            BinaryType::Base64 => Payload::Base64(encoded.to_string()),
        };
        return Ok(Packet {
            packet_type,
            payload: Some(payload),
        });
    }

    let packet_type = parse_tag(first)?;
    let rest = chars.as_str();
    // A bare type digit carries no payload, even if an empty one was sent.
    let payload = if rest.is_empty() {
        None
    } else {
        Some(Payload::Text(rest.to_string()))
    };

    Ok(Packet {
        packet_type,
        payload,
    })
}

fn decode_binary(data: &Bytes, binary_type: BinaryType) -> Result<Packet, ProtocolError> {
    let (&tag, _) = data.split_first().ok_or(ProtocolError::Empty)?;
    let packet_type = PacketType::try_from(tag)
        .map_err(|_| ProtocolError::UnknownPacketType(format!("0x{tag:02x}")))?;

    let body = data.slice(1..);
    let payload = match binary_type {
        BinaryType::Bytes => Payload::Binary(body),
        BinaryType::Base64 => Payload::Base64(STANDARD.encode(&body)),
    };

    Ok(Packet {
        packet_type,
        payload: Some(payload),
    })
}

fn parse_tag(tag: char) -> Result<PacketType, ProtocolError> {
    PacketType::from_char(tag).ok_or_else(|| ProtocolError::UnknownPacketType(tag.to_string()))
}

/// A packet codec that can be injected into a transport.
pub trait Codec: Send + Sync {
    /// Encode a packet into a raw frame.
    fn encode(&self, packet: &Packet, supports_binary: bool) -> RawData;

    /// Decode a raw frame into a packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be decoded.
    fn decode(&self, raw: &RawData, binary_type: BinaryType) -> Result<Packet, ProtocolError>;
}

/// The default packet codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl PacketCodec {
    /// Create a new codec instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for PacketCodec {
    fn encode(&self, packet: &Packet, supports_binary: bool) -> RawData {
        encode(packet, supports_binary)
    }

    fn decode(&self, raw: &RawData, binary_type: BinaryType) -> Result<Packet, ProtocolError> {
        decode(raw, binary_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_text_packets() {
        let msg = decode(&RawData::from("4hello"), BinaryType::Bytes).unwrap();
        assert_eq!(msg, Packet::message("hello"));

        let pong = decode(&RawData::from("3"), BinaryType::Bytes).unwrap();
        assert_eq!(pong, Packet::pong());

        // Payloads may contain anything, including more digits.
        let digits = decode(&RawData::from("42probe"), BinaryType::Bytes).unwrap();
        assert_eq!(digits.text(), Some("2probe"));
    }

    #[test]
    fn test_encode_text_packets() {
        assert_eq!(encode(&Packet::ping(), true), RawData::from("2"));
        assert_eq!(encode(&Packet::message("hi"), false), RawData::from("4hi"));
    }

    #[test]
    fn test_binary_frames() {
        let packet = Packet::message(vec![0xde, 0xad]);

        let raw = encode(&packet, true);
        assert_eq!(raw, RawData::Binary(Bytes::from_static(&[4, 0xde, 0xad])));
        assert_eq!(decode(&raw, BinaryType::Bytes).unwrap(), packet);

        let as_base64 = decode(&raw, BinaryType::Base64).unwrap();
        assert_eq!(as_base64.payload, Some(Payload::Base64("3q0=".to_string())));
    }

    #[test]
    fn test_base64_text_frames() {
        let packet = Packet::message(vec![0xde, 0xad]);

        let raw = encode(&packet, false);
        assert_eq!(raw, RawData::from("b43q0="));
        assert_eq!(decode(&raw, BinaryType::Bytes).unwrap(), packet);

        let kept = decode(&raw, BinaryType::Base64).unwrap();
        assert_eq!(kept.payload, Some(Payload::Base64("3q0=".to_string())));
        assert_eq!(encode(&kept, true), raw);
    }

    #[test]
    fn test_decode_errors() {
        match decode(&RawData::from(""), BinaryType::Bytes) {
            Err(ProtocolError::Empty) => {}
            other => panic!("Expected Empty error, got {:?}", other),
        }

        match decode(&RawData::from("9oops"), BinaryType::Bytes) {
            Err(ProtocolError::UnknownPacketType(tag)) => assert_eq!(tag, "9"),
            other => panic!("Expected UnknownPacketType error, got {:?}", other),
        }

        match decode(&RawData::from("b4!!!"), BinaryType::Bytes) {
            Err(ProtocolError::InvalidBase64(_)) => {}
            other => panic!("Expected InvalidBase64 error, got {:?}", other),
        }

        match decode(&RawData::Binary(Bytes::from_static(&[0x42, 1])), BinaryType::Bytes) {
            Err(ProtocolError::UnknownPacketType(tag)) => assert_eq!(tag, "0x42"),
            other => panic!("Expected UnknownPacketType error, got {:?}", other),
        }

        assert!(matches!(
            decode(&RawData::Binary(Bytes::new()), BinaryType::Bytes),
            Err(ProtocolError::Empty)
        ));
    }

    #[test]
    fn test_text_from_bytes() {
        assert_eq!(
            RawData::text_from_bytes(b"4hi".to_vec()).unwrap(),
            RawData::from("4hi")
        );
        assert!(matches!(
            RawData::text_from_bytes(vec![0xff, 0xfe]),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_empty_text_payload_decodes_as_none() {
        let raw = encode(&Packet::message(""), true);
        assert_eq!(raw, RawData::from("4"));

        let decoded = decode(&raw, BinaryType::Bytes).unwrap();
        assert_eq!(decoded.packet_type, PacketType::Message);
        assert_eq!(decoded.payload, None);
    }

    #[test]
    fn test_packet_codec_delegates() {
        let codec = PacketCodec::new();
        let raw = codec.encode(&Packet::message("x"), true);
        assert_eq!(codec.decode(&raw, BinaryType::Bytes).unwrap(), Packet::message("x"));
    }

    proptest! {
        #[test]
        fn prop_decode_text_never_panics(s in ".*") {
            let _ = decode(&RawData::Text(s), BinaryType::Bytes);
        }

        #[test]
        fn prop_decode_binary_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode(&RawData::Binary(Bytes::from(data)), BinaryType::Base64);
        }
    }
}
