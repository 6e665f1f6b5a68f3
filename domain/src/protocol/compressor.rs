//! Stateful dictionary compression for message text.
//!
//! Both sides share a word dictionary and exchange word ids instead of
//! words. Ids are variable-length: one byte below 128, two below 16384,
//! three otherwise. Continuation bytes carry the high bit; 7-bit groups
//! are emitted most-significant first.
//!
//! Compression is lossy with respect to whitespace: text is split on
//! whitespace and decompression rejoins with single spaces.

use std::collections::HashMap;

/// Shared word dictionary plus varint codec.
#[derive(Debug, Clone, Default)]
pub struct DictionaryCompressor {
    words: HashMap<String, u32>,
    ids: HashMap<u32, String>,
    next_id: u32,
}

impl DictionaryCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a word, returning its id. Re-adding an existing word
    /// returns the original id.
    pub fn add_term(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.words.get(word) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.words.insert(word.to_string(), id);
        self.ids.insert(id, word.to_string());
        id
    }

    /// Compress text to a sequence of varint-encoded word ids. New words
    /// are added to the dictionary as a side effect.
    pub fn compress(&mut self, text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for word in text.split_whitespace() {
            let id = self.add_term(word);
            encode_varint(id, &mut out);
        }
        out
    }

    /// Decompress a sequence of word ids back to text. Ids missing from
    /// the dictionary render as `[id]`.
    pub fn decompress(&self, data: &[u8]) -> String {
        let mut words = Vec::new();
        let mut iter = data.iter().copied();
        while let Some(id) = decode_varint(&mut iter) {
            match self.ids.get(&id) {
                Some(word) => words.push(word.clone()),
                None => words.push(format!("[{id}]")),
            }
        }
        words.join(" ")
    }

    /// Snapshot of the word-to-id dictionary, for sharing with a peer.
    pub fn export_dictionary(&self) -> HashMap<String, u32> {
        self.words.clone()
    }

    /// Replace the dictionary with an imported snapshot. The next fresh
    /// id continues after the highest imported one.
    pub fn import_dictionary(&mut self, dictionary: HashMap<String, u32>) {
        self.words = dictionary;
        self.ids = self
            .words
            .iter()
            .map(|(word, &id)| (id, word.clone()))
            .collect();
        self.next_id = self.words.values().max().map_or(0, |&max| max + 1);
    }

    /// Number of words currently in the dictionary.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn encode_varint(id: u32, out: &mut Vec<u8>) {
    if id < 0x80 {
        out.push(id as u8);
    } else if id < 0x4000 {
        out.push(0x80 | (id >> 7) as u8);
        out.push((id & 0x7F) as u8);
    } else {
        out.push(0x80 | (id >> 14) as u8);
        out.push(0x80 | ((id >> 7) & 0x7F) as u8);
        out.push((id & 0x7F) as u8);
    }
}

fn decode_varint(iter: &mut impl Iterator<Item = u8>) -> Option<u32> {
    let mut value = 0u32;
    loop {
        let byte = iter.next()?;
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
}
