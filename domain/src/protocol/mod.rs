//! Agent Inter-Communication Protocol: wire types, binary codec,
//! shorthand notation, and dictionary compression.

pub mod codec;
pub mod compressor;
pub mod shorthand;
pub mod types;

pub use codec::{
    create_broadcast, create_correlated, create_message, decode, encode, ProtocolError,
    BROADCAST_RECIPIENT, HEADER_SIZE, PROTOCOL_VERSION,
};
pub use compressor::DictionaryCompressor;
pub use shorthand::ShorthandMessage;
pub use types::{Message, MessageFlags, MessageHeader, MessageType, Priority};
