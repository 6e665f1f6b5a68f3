//! Compact text notation for agent messages.
//!
//! Grammar: `@SENDER>RECIPIENT:TYPE:DATA(:PARAM|KEY=VALUE)*`
//!
//! Tokens are shorthand codes expanded through a fixed dictionary
//! (`SEC` -> `security`, `TASK` -> `task_assign`, ...). `*` as recipient
//! means broadcast. A bare parameter is a boolean flag.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::codec;
use super::types::{Message, MessageFlags, MessageType};

/// Shorthand term dictionary: (code, expansion).
const ABBREVIATIONS: &[(&str, &str)] = &[
    // Agent roles
    ("ORCH", "orchestrator"),
    ("ARCH", "architect"),
    ("CODE", "coder"),
    ("REV", "reviewer"),
    ("TEST", "tester"),
    ("SEC", "security"),
    ("DOC", "documentation"),
    ("RES", "research"),
    // Actions
    ("TASK", "task_assign"),
    ("DONE", "task_complete"),
    ("FAIL", "task_failed"),
    ("PROG", "task_progress"),
    ("QUERY", "kb_query"),
    ("UPD", "kb_update"),
    ("DISC", "discuss_start"),
    ("VOTE", "discuss_vote"),
    ("CONS", "discuss_consensus"),
    // Priorities
    ("P0", "critical"),
    ("P1", "urgent"),
    ("P2", "high"),
    ("P3", "normal"),
    ("P4", "low"),
    // Status
    ("OK", "success"),
    ("ERR", "error"),
    ("WAIT", "waiting"),
    ("RUN", "running"),
    // Common terms
    ("IMPL", "implement"),
    ("REFA", "refactor"),
    ("FIX", "fix"),
    ("ADD", "add"),
    ("DEL", "delete"),
    ("MOD", "modify"),
    ("REQ", "request"),
    ("RESP", "response"),
    ("AUTH", "authentication"),
    ("API", "api"),
    ("DB", "database"),
    ("UI", "user_interface"),
    ("SVC", "service"),
    ("CFG", "configuration"),
];

/// Expanded message type names to wire types. Anything else maps to `SysLog`.
const TYPE_MAP: &[(&str, MessageType)] = &[
    ("task_assign", MessageType::TaskAssign),
    ("task_complete", MessageType::TaskComplete),
    ("task_failed", MessageType::TaskFailed),
    ("task_progress", MessageType::TaskProgress),
    ("kb_query", MessageType::KbQuery),
    ("kb_update", MessageType::KbUpdate),
    ("discuss_start", MessageType::DiscussStart),
    ("discuss_vote", MessageType::DiscussVote),
    ("discuss_consensus", MessageType::DiscussConsensus),
    ("sec_alert", MessageType::SecAlert),
];

/// Expand a shorthand code, falling back to the lowercased input.
pub fn expand(term: &str) -> String {
    let upper = term.to_uppercase();
    ABBREVIATIONS
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(_, full)| (*full).to_string())
        .unwrap_or_else(|| term.to_lowercase())
}

/// Compress a full term to its shorthand code, falling back to the first
/// four characters uppercased.
pub fn compress(term: &str) -> String {
    let lower = term.to_lowercase();
    ABBREVIATIONS
        .iter()
        .find(|(_, full)| *full == lower)
        .map(|(code, _)| (*code).to_string())
        .unwrap_or_else(|| term.to_uppercase().chars().take(4).collect())
}

/// A parsed shorthand message, with all tokens expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShorthandMessage {
    pub sender: String,
    pub recipient: String,
    pub kind: String,
    pub data: String,
    pub params: BTreeMap<String, String>,
}

impl ShorthandMessage {
    /// Parse shorthand notation. Returns `None` when the input does not
    /// match the grammar: missing `@`, missing `>`, missing separators,
    /// or empty tokens.
    pub fn parse(input: &str) -> Option<Self> {
        let rest = input.strip_prefix('@')?;
        let (sender_tok, rest) = rest.split_once('>')?;
        let (recipient_tok, rest) = rest.split_once(':')?;
        let (kind_tok, rest) = rest.split_once(':')?;
        let (data, params_str) = match rest.split_once(':') {
            Some((data, params)) => (data, Some(params)),
            None => (rest, None),
        };

        if !is_token(sender_tok) || !is_token(kind_tok) || data.is_empty() {
            return None;
        }
        if recipient_tok != "*" && !is_token(recipient_tok) {
            return None;
        }

        let mut params = BTreeMap::new();
        if let Some(params_str) = params_str {
            for part in params_str.split(':') {
                if part.is_empty() {
                    return None;
                }
                match part.split_once('=') {
                    Some((key, value)) => params.insert(key.to_string(), value.to_string()),
                    None => params.insert(part.to_string(), "true".to_string()),
                };
            }
        }

        Some(ShorthandMessage {
            sender: expand(sender_tok),
            recipient: if recipient_tok == "*" {
                "broadcast".to_string()
            } else {
                expand(recipient_tok)
            },
            kind: expand(kind_tok),
            data: data.to_string(),
            params,
        })
    }

    /// Render back to shorthand notation. Boolean parameters (value
    /// `"true"`) are written bare; parameters appear in sorted key order.
    pub fn format(&self) -> String {
        let recipient = if self.recipient == "broadcast" {
            "*".to_string()
        } else {
            compress(&self.recipient)
        };
        let mut out = format!(
            "@{}>{}:{}:{}",
            compress(&self.sender),
            recipient,
            compress(&self.kind),
            self.data
        );
        for (key, value) in &self.params {
            if value == "true" {
                out.push_str(&format!(":{key}"));
            } else {
                out.push_str(&format!(":{key}={value}"));
            }
        }
        out
    }

    /// Convert to a full protocol message. The payload carries the data
    /// string and all parameters; unknown kinds become `SysLog`.
    pub fn to_message(&self, sender: Uuid, recipient: Uuid) -> Message {
        let message_type = TYPE_MAP
            .iter()
            .find(|(name, _)| *name == self.kind)
            .map(|(_, ty)| *ty)
            .unwrap_or(MessageType::SysLog);

        let mut payload = Map::new();
        payload.insert("data".to_string(), Value::String(self.data.clone()));
        for (key, value) in &self.params {
            payload.insert(key.clone(), Value::String(value.clone()));
        }

        if self.recipient == "broadcast" {
            codec::create_broadcast(sender, message_type, Value::Object(payload), MessageFlags::NONE)
        } else {
            codec::create_message(
                sender,
                recipient,
                message_type,
                Value::Object(payload),
                MessageFlags::NONE,
            )
        }
    }
}

fn is_token(tok: &str) -> bool {
    !tok.is_empty() && tok.chars().all(|c| c.is_alphanumeric() || c == '_')
}
