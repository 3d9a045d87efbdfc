// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::regs::MSG_WORDS;

/// Size of a message in bytes.
pub const MSG_LEN: usize = MSG_WORDS * 4;

/// One mailbox message: eight raw 32-bit words.
///
/// Peers conventionally put a message id in byte 0 and up to 31 bytes of
/// payload after it; the hardware itself only moves words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Message([u32; MSG_WORDS]);

impl Message {
    pub const fn from_words(words: [u32; MSG_WORDS]) -> Self {
        Self(words)
    }

    /// Builds a message from bytes laid out little-endian, word by word.
    pub fn from_bytes(bytes: &[u8; MSG_LEN]) -> Self {
        let mut words = [0u32; MSG_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self(words)
    }

    /// Builds a message carrying `id` in byte 0 and `data` after it.
    ///
    /// Returns `None` if `data` is longer than 31 bytes.
    pub fn with_id(id: u8, data: &[u8]) -> Option<Self> {
        if data.len() > MSG_LEN - 1 {
            return None;
        }
        let mut bytes = [0u8; MSG_LEN];
        bytes[0] = id;
        bytes[1..=data.len()].copy_from_slice(data);
        Some(Self::from_bytes(&bytes))
    }

    pub const fn words(&self) -> &[u32; MSG_WORDS] {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; MSG_LEN] {
        let mut bytes = [0u8; MSG_LEN];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn id(&self) -> u8 {
        (self.0[0] & 0xff) as u8
    }

    /// The 31 bytes following the id.
    pub fn data(&self) -> [u8; MSG_LEN - 1] {
        let bytes = self.to_bytes();
        let mut data = [0u8; MSG_LEN - 1];
        data.copy_from_slice(&bytes[1..]);
        data
    }
}

impl From<[u32; MSG_WORDS]> for Message {
    fn from(words: [u32; MSG_WORDS]) -> Self {
        Self(words)
    }
}
