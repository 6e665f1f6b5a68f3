//! Core wire types for the Agent Inter-Communication Protocol (AICP).
//!
//! A message is a fixed 56-byte header followed by a schema-less payload.
//! Multi-byte header fields are big-endian; agent identifiers are 16-byte
//! packed UUIDs with the nil UUID denoting broadcast.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use uuid::Uuid;

use crate::util::current_timestamp_ms;

/// Message type codes, grouped by range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Core protocol (0x00-0x0F)
    Ping = 0x01,
    Pong = 0x02,
    Ack = 0x03,
    Nack = 0x04,
    Hello = 0x05,
    Goodbye = 0x06,
    Error = 0x0F,

    // Task management (0x10-0x1F)
    TaskAssign = 0x10,
    TaskAccept = 0x11,
    TaskReject = 0x12,
    TaskProgress = 0x13,
    TaskComplete = 0x14,
    TaskFailed = 0x15,
    TaskCancel = 0x16,
    TaskDelegate = 0x17,

    // Knowledge base (0x20-0x2F)
    KbQuery = 0x20,
    KbResult = 0x21,
    KbUpdate = 0x22,
    KbDelete = 0x23,
    KbSubscribe = 0x24,
    KbNotify = 0x25,

    // Discussion & consensus (0x30-0x3F)
    DiscussStart = 0x30,
    DiscussJoin = 0x31,
    DiscussLeave = 0x32,
    DiscussOpinion = 0x33,
    DiscussQuestion = 0x34,
    DiscussAnswer = 0x35,
    DiscussVote = 0x36,
    DiscussConsensus = 0x37,
    DiscussDeadlock = 0x38,

    // Code operations (0x40-0x4F)
    CodeSubmit = 0x40,
    CodeReview = 0x41,
    CodeSuggestion = 0x42,
    CodeApproved = 0x43,
    CodeRejected = 0x44,
    CodeMerge = 0x45,
    CodeConflict = 0x46,

    // Human interaction (0x50-0x5F)
    HumanInput = 0x50,
    HumanOutput = 0x51,
    HumanEscalate = 0x52,
    HumanApprove = 0x53,
    HumanReject = 0x54,
    HumanClarify = 0x55,

    // Security (0x60-0x6F)
    SecAlert = 0x60,
    SecAudit = 0x61,
    SecViolation = 0x62,
    SecApprove = 0x63,

    // System (0xF0-0xFF)
    SysStatus = 0xF0,
    SysMetrics = 0xF1,
    SysLog = 0xF2,
    SysConfig = 0xF3,
    SysShutdown = 0xFE,
    SysRestart = 0xFF,
}

impl MessageType {
    /// The wire code for this message type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a message type by wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        use MessageType::*;
        let ty = match code {
            0x01 => Ping,
            0x02 => Pong,
            0x03 => Ack,
            0x04 => Nack,
            0x05 => Hello,
            0x06 => Goodbye,
            0x0F => Error,
            0x10 => TaskAssign,
            0x11 => TaskAccept,
            0x12 => TaskReject,
            0x13 => TaskProgress,
            0x14 => TaskComplete,
            0x15 => TaskFailed,
            0x16 => TaskCancel,
            0x17 => TaskDelegate,
            0x20 => KbQuery,
            0x21 => KbResult,
            0x22 => KbUpdate,
            0x23 => KbDelete,
            0x24 => KbSubscribe,
            0x25 => KbNotify,
            0x30 => DiscussStart,
            0x31 => DiscussJoin,
            0x32 => DiscussLeave,
            0x33 => DiscussOpinion,
            0x34 => DiscussQuestion,
            0x35 => DiscussAnswer,
            0x36 => DiscussVote,
            0x37 => DiscussConsensus,
            0x38 => DiscussDeadlock,
            0x40 => CodeSubmit,
            0x41 => CodeReview,
            0x42 => CodeSuggestion,
            0x43 => CodeApproved,
            0x44 => CodeRejected,
            0x45 => CodeMerge,
            0x46 => CodeConflict,
            0x50 => HumanInput,
            0x51 => HumanOutput,
            0x52 => HumanEscalate,
            0x53 => HumanApprove,
            0x54 => HumanReject,
            0x55 => HumanClarify,
            0x60 => SecAlert,
            0x61 => SecAudit,
            0x62 => SecViolation,
            0x63 => SecApprove,
            0xF0 => SysStatus,
            0xF1 => SysMetrics,
            0xF2 => SysLog,
            0xF3 => SysConfig,
            0xFE => SysShutdown,
            0xFF => SysRestart,
            _ => return None,
        };
        Some(ty)
    }
}

/// Message flags (16-bit bitfield).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageFlags(u16);

impl MessageFlags {
    pub const NONE: MessageFlags = MessageFlags(0x0000);
    pub const REQUIRES_ACK: MessageFlags = MessageFlags(0x0001);
    pub const ENCRYPTED: MessageFlags = MessageFlags(0x0002);
    pub const COMPRESSED: MessageFlags = MessageFlags(0x0004);
    pub const SIGNED: MessageFlags = MessageFlags(0x0008);
    pub const BROADCAST: MessageFlags = MessageFlags(0x0010);
    pub const URGENT: MessageFlags = MessageFlags(0x0020);
    pub const RETRANSMIT: MessageFlags = MessageFlags(0x0040);
    pub const FINAL: MessageFlags = MessageFlags(0x0080);

    /// Raw bitfield value as written to the wire.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Reconstruct from a wire value. Unknown bits are preserved.
    pub fn from_bits(bits: u16) -> Self {
        MessageFlags(bits)
    }

    /// Check whether all flags in `other` are set.
    pub fn contains(self, other: MessageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set all flags in `other`.
    pub fn insert(&mut self, other: MessageFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for MessageFlags {
    type Output = MessageFlags;

    fn bitor(self, rhs: MessageFlags) -> MessageFlags {
        MessageFlags(self.0 | rhs.0)
    }
}

/// Message priority levels, higher values are dequeued first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Urgent = 3,
    Critical = 4,
}

impl Priority {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Priority::Low),
            1 => Some(Priority::Normal),
            2 => Some(Priority::High),
            3 => Some(Priority::Urgent),
            4 => Some(Priority::Critical),
            _ => None,
        }
    }
}

/// Fixed-width message header (56 bytes on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Protocol version (1 byte).
    pub version: u8,
    /// Message type (1 byte).
    pub message_type: MessageType,
    /// Message flags (2 bytes).
    pub flags: MessageFlags,
    /// Payload length in bytes (4 bytes).
    pub length: u32,
    /// Sender agent id (16 bytes).
    pub sender: Uuid,
    /// Recipient agent id, nil for broadcast (16 bytes).
    pub recipient: Uuid,
    /// Correlation id for request/response pairing (16 bytes).
    pub correlation_id: Uuid,
}

/// A protocol message: header plus schema-less payload.
///
/// The optional signature exists in the data model for forward compatibility;
/// signing and verification are not performed by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: serde_json::Value,
    /// Local timestamp in milliseconds since epoch, set at creation or decode.
    pub timestamp_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

impl Message {
    /// Whether this message is addressed to every agent.
    pub fn is_broadcast(&self) -> bool {
        self.header.recipient.is_nil() || self.header.flags.contains(MessageFlags::BROADCAST)
    }

    /// Refresh the local timestamp, used after decode.
    pub(crate) fn stamp(mut self) -> Self {
        self.timestamp_ms = current_timestamp_ms();
        self
    }
}
