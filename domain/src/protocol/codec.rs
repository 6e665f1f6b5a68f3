//! Binary encoder/decoder for AICP messages.
//!
//! Wire layout (all multi-byte integers big-endian):
//!
//! ```text
//! offset  size  field
//!      0     1  version
//!      1     1  message type
//!      2     2  flags
//!      4     4  payload length
//!      8    16  sender UUID
//!     24    16  recipient UUID
//!     40    16  correlation UUID
//!     56     -  payload (JSON bytes)
//! ```

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::types::{Message, MessageFlags, MessageHeader, MessageType};
use crate::util::current_timestamp_ms;

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 56;

/// Recipient id used for broadcast messages.
pub const BROADCAST_RECIPIENT: Uuid = Uuid::nil();

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported protocol version {actual}, expected {expected}")]
    VersionMismatch { expected: u8, actual: u8 },
    #[error("message too short: {actual} bytes, header needs {expected}")]
    Truncated { expected: usize, actual: usize },
    #[error("payload truncated: header declares {declared} bytes, {actual} available")]
    PayloadTruncated { declared: usize, actual: usize },
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Build a message addressed to a single recipient, with a fresh
/// correlation id.
pub fn create_message(
    sender: Uuid,
    recipient: Uuid,
    message_type: MessageType,
    payload: Value,
    flags: MessageFlags,
) -> Message {
    create_correlated(sender, recipient, message_type, payload, flags, Uuid::new_v4())
}

/// Build a message carrying an explicit correlation id, linking it to an
/// earlier exchange.
pub fn create_correlated(
    sender: Uuid,
    recipient: Uuid,
    message_type: MessageType,
    payload: Value,
    flags: MessageFlags,
    correlation_id: Uuid,
) -> Message {
    Message {
        header: MessageHeader {
            version: PROTOCOL_VERSION,
            message_type,
            flags,
            length: 0,
            sender,
            recipient,
            correlation_id,
        },
        payload,
        timestamp_ms: current_timestamp_ms(),
        signature: None,
    }
}

/// Build a broadcast message: nil recipient, broadcast flag set.
pub fn create_broadcast(
    sender: Uuid,
    message_type: MessageType,
    payload: Value,
    flags: MessageFlags,
) -> Message {
    create_message(
        sender,
        BROADCAST_RECIPIENT,
        message_type,
        payload,
        flags | MessageFlags::BROADCAST,
    )
}

/// Serialize a message to its wire form. The header length field is
/// recomputed from the actual payload bytes.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload =
        serde_json::to_vec(&message.payload).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| ProtocolError::Malformed("payload exceeds u32 length".to_string()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(message.header.version);
    buf.push(message.header.message_type.code());
    buf.extend_from_slice(&message.header.flags.bits().to_be_bytes());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(message.header.sender.as_bytes());
    buf.extend_from_slice(message.header.recipient.as_bytes());
    buf.extend_from_slice(message.header.correlation_id.as_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Parse a message from its wire form.
pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: version,
        });
    }

    let message_type = MessageType::from_code(bytes[1])
        .ok_or_else(|| ProtocolError::Malformed(format!("unknown message type 0x{:02X}", bytes[1])))?;
    let flags = MessageFlags::from_bits(u16::from_be_bytes([bytes[2], bytes[3]]));
    let length = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

    let available = bytes.len() - HEADER_SIZE;
    if available < length {
        return Err(ProtocolError::PayloadTruncated {
            declared: length,
            actual: available,
        });
    }

    let sender = uuid_at(bytes, 8)?;
    let recipient = uuid_at(bytes, 24)?;
    let correlation_id = uuid_at(bytes, 40)?;

    let payload: Value = serde_json::from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + length])
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    Ok(Message {
        header: MessageHeader {
            version,
            message_type,
            flags,
            length: length as u32,
            sender,
            recipient,
            correlation_id,
        },
        payload,
        timestamp_ms: 0,
        signature: None,
    }
    .stamp())
}

fn uuid_at(bytes: &[u8], offset: usize) -> Result<Uuid, ProtocolError> {
    Uuid::from_slice(&bytes[offset..offset + 16])
        .map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_message() -> Message {
        create_message(
            Uuid::new_v4(),
            Uuid::new_v4(),
            MessageType::TaskAssign,
            json!({ "task": "review module", "priority": 1 }),
            MessageFlags::REQUIRES_ACK,
        )
    }

    #[test]
    fn encode_decode_round_trip() {
        let message = sample_message();
        let bytes = encode(&message).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.header.message_type, MessageType::TaskAssign);
        assert_eq!(decoded.header.flags, MessageFlags::REQUIRES_ACK);
        assert_eq!(decoded.header.sender, message.header.sender);
        assert_eq!(decoded.header.recipient, message.header.recipient);
        assert_eq!(decoded.header.correlation_id, message.header.correlation_id);
        assert_eq!(decoded.payload, message.payload);
    }

    #[test]
    fn correlated_message_keeps_given_id() {
        let correlation = Uuid::new_v4();
        let message = create_correlated(
            Uuid::new_v4(),
            Uuid::new_v4(),
            MessageType::TaskComplete,
            json!({ "result": "done" }),
            MessageFlags::NONE,
            correlation,
        );
        assert_eq!(message.header.correlation_id, correlation);

        let decoded = decode(&encode(&message).unwrap()).unwrap();
        assert_eq!(decoded.header.correlation_id, correlation);
    }

    #[test]
    fn header_is_exactly_56_bytes() {
        let message = create_message(
            Uuid::new_v4(),
            Uuid::new_v4(),
            MessageType::Ping,
            json!(null),
            MessageFlags::NONE,
        );
        let bytes = encode(&message).unwrap();
        // "null" payload is 4 bytes
        assert_eq!(bytes.len(), HEADER_SIZE + 4);
        assert_eq!(
            u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            4
        );
    }

    #[test]
    fn decode_rejects_short_input() {
        let err = decode(&[0u8; 20]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                expected: HEADER_SIZE,
                actual: 20
            }
        ));
    }

    #[test]
    fn decode_rejects_version_mismatch() {
        let mut bytes = encode(&sample_message()).unwrap();
        bytes[0] = 99;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: 99
            }
        ));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let bytes = encode(&sample_message()).unwrap();
        let err = decode(&bytes[..bytes.len() - 5]).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTruncated { .. }));
    }

    #[test]
    fn decode_rejects_unknown_type_code() {
        let mut bytes = encode(&sample_message()).unwrap();
        bytes[1] = 0x7A;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn broadcast_uses_nil_recipient() {
        let message = create_broadcast(
            Uuid::new_v4(),
            MessageType::SecAlert,
            json!({ "severity": "high" }),
            MessageFlags::URGENT,
        );
        assert_eq!(message.header.recipient, BROADCAST_RECIPIENT);
        assert!(message.header.flags.contains(MessageFlags::BROADCAST));
        assert!(message.is_broadcast());
    }

    #[test]
    fn length_field_recomputed_on_encode() {
        let mut message = sample_message();
        message.header.length = 9999;
        let bytes = encode(&message).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.header.length as usize, bytes.len() - HEADER_SIZE);
    }
}
