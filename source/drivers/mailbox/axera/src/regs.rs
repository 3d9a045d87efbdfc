// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Register map of the mailbox block.
//!
//! Per-master registers are selected by OR-ing `master << 4` into the base
//! offset. Per-channel registers are 32-bit words indexed by channel.

use bitflags::bitflags;

use crate::error::Result;
use crate::id::{ChannelId, MasterId};

/// Words per message.
pub const MSG_WORDS: usize = 8;

/// Bytes per message; the length field of every info word we send.
pub const MSG_BYTES: u32 = (MSG_WORDS * 4) as u32;

/// Value the search register returns when every slot is locked.
pub const SEARCH_NONE: u32 = 0xffff_ffff;

/// Size of the mailbox register window.
pub const WINDOW_LEN: usize = 0x400;

const INFO_BASE: usize = 0x100;
const INT_STATS: usize = 0x300;
const INT_CLR: usize = 0x304;
const SEARCH: usize = 0x308;
const UNLOCK: usize = 0x30c;
const MASTER_SHIFT: u32 = 4;

/// Payload FIFO of `ch`; eight consecutive accesses move one message.
pub const fn data(ch: ChannelId) -> usize {
    ch.index() << 2
}

/// Info register of `ch`.
pub const fn info(ch: ChannelId) -> usize {
    INFO_BASE + (ch.index() << 2)
}

pub const fn int_stats(master: MasterId) -> usize {
    INT_STATS | master_shifted(master)
}

pub const fn int_clr(master: MasterId) -> usize {
    INT_CLR | master_shifted(master)
}

/// Reading locks a free slot for `sender` and returns its index.
pub const fn search(sender: MasterId) -> usize {
    SEARCH | master_shifted(sender)
}

/// Writing a slot index releases a slot locked by `master`.
pub const fn unlock(master: MasterId) -> usize {
    UNLOCK | master_shifted(master)
}

const fn master_shifted(master: MasterId) -> usize {
    master.index() << MASTER_SHIFT
}

/// Register block a decoded offset refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Data(ChannelId),
    Info(ChannelId),
    IntStats(MasterId),
    IntClr(MasterId),
    Search(MasterId),
    Unlock(MasterId),
}

impl Register {
    /// Maps a byte offset back to the register it addresses.
    pub fn decode(offset: usize) -> Option<Self> {
        if offset % 4 != 0 {
            return None;
        }
        let word = (offset >> 2) as u32;
        match offset {
            0x000..=0x07c => ChannelId::new(word).ok().map(Self::Data),
            0x100..=0x17c => ChannelId::new(word - 0x40).ok().map(Self::Info),
            0x300..=0x3ff => {
                let master = MasterId::new(((offset >> MASTER_SHIFT) & 0xf) as u32).ok()?;
                match offset & 0xf {
                    0x0 => Some(Self::IntStats(master)),
                    0x4 => Some(Self::IntClr(master)),
                    0x8 => Some(Self::Search(master)),
                    0xc => Some(Self::Unlock(master)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

bitflags! {
    /// Event bits in the low nibble of a master's interrupt status.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct IntEvents: u32 {
        /// A well-formed message was delivered to this master.
        const NORMAL = 1 << 0;
        /// The receiver id written in an info word exceeds the master count.
        const ERR_SLAVE = 1 << 1;
        /// More words were read from a slot than were written to it.
        const RD_EMPTY = 1 << 2;
        /// More than eight words were written to a slot.
        const WR_FULL = 1 << 3;
    }
}

/// Raw interrupt status of one master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntStatus(pub u32);

impl IntStatus {
    const SLOT_SHIFT: u32 = 16;
    const SLOT_MASK: u32 = 0x1f;

    pub fn new(events: IntEvents, slot: ChannelId) -> Self {
        Self(events.bits() | (slot.raw() << Self::SLOT_SHIFT))
    }

    /// The low nibble, exactly as written back to `INT_CLR`.
    pub const fn nibble(self) -> u32 {
        self.0 & 0xf
    }

    pub const fn events(self) -> IntEvents {
        IntEvents::from_bits_truncate(self.0)
    }

    /// Only the normal event is raised.
    pub const fn is_normal(self) -> bool {
        self.nibble() == IntEvents::NORMAL.bits()
    }

    pub fn slot(self) -> ChannelId {
        // The mask keeps the value below NUM_CHANNELS.
        match ChannelId::new((self.0 >> Self::SLOT_SHIFT) & Self::SLOT_MASK) {
            Ok(ch) => ch,
            Err(_) => unreachable!("5-bit slot field"),
        }
    }
}

/// Packed control word that addresses a message and triggers delivery.
///
/// Layout: `receiver[31:28] | sender[27:24] | channel[23:16] | length[15:0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoWord {
    pub receiver: MasterId,
    pub sender: MasterId,
    pub channel: ChannelId,
    /// Payload length in bytes.
    pub len: u16,
}

impl InfoWord {
    pub fn new(sender: MasterId, receiver: MasterId, channel: ChannelId) -> Self {
        Self { receiver, sender, channel, len: MSG_BYTES as u16 }
    }

    pub fn encode(self) -> u32 {
        (self.receiver.raw() << 28)
            | (self.sender.raw() << 24)
            | (self.channel.raw() << 16)
            | u32::from(self.len)
    }

    /// Fails when the channel field holds an index the block doesn't have.
    pub fn decode(raw: u32) -> Result<Self> {
        Ok(Self {
            receiver: MasterId::new(raw >> 28)?,
            sender: MasterId::new((raw >> 24) & 0xf)?,
            channel: ChannelId::new((raw >> 16) & 0xff)?,
            len: (raw & 0xffff) as u16,
        })
    }
}
