// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Master and channel identifiers.
//!
//! Both are range-checked at construction so the register helpers and the
//! info-word encoder never see an id that would spill into a neighbouring
//! bit field.

use core::fmt;

use crate::error::{MailboxError, Result};

/// Number of hardware message slots.
pub const NUM_CHANNELS: usize = 32;

/// Exclusive upper bound for master ids; the info word has 4 bits per id.
pub const MAX_MASTERS: u32 = 16;

/// Hardware identifier of a core taking part in mailbox traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MasterId(u8);

impl MasterId {
    pub const ARM0: Self = Self(0);
    pub const ARM1: Self = Self(1);
    pub const RISCV: Self = Self(2);

    pub fn new(raw: u32) -> Result<Self> {
        if raw < MAX_MASTERS {
            Ok(Self(raw as u8))
        } else {
            Err(MailboxError::InvalidMaster(raw))
        }
    }

    pub const fn raw(self) -> u32 {
        self.0 as u32
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u32> for MasterId {
    type Error = MailboxError;

    fn try_from(raw: u32) -> Result<Self> {
        Self::new(raw)
    }
}

impl fmt::Display for MasterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ARM0 => f.write_str("arm0"),
            Self::ARM1 => f.write_str("arm1"),
            Self::RISCV => f.write_str("riscv"),
            Self(raw) => write!(f, "master{raw}"),
        }
    }
}

/// Index of one of the hardware message slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    pub fn new(raw: u32) -> Result<Self> {
        if (raw as usize) < NUM_CHANNELS {
            Ok(Self(raw as u8))
        } else {
            Err(MailboxError::InvalidChannel(raw))
        }
    }

    pub const fn raw(self) -> u32 {
        self.0 as u32
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every channel in index order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..NUM_CHANNELS as u8).map(Self)
    }
}

impl TryFrom<u32> for ChannelId {
    type Error = MailboxError;

    fn try_from(raw: u32) -> Result<Self> {
        Self::new(raw)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_range_is_four_bits() {
        assert_eq!(MasterId::new(15).unwrap().raw(), 15);
        assert_eq!(MasterId::new(16), Err(MailboxError::InvalidMaster(16)));
        assert_eq!(MasterId::try_from(2).unwrap(), MasterId::RISCV);
    }

    #[test]
    fn channel_range() {
        assert_eq!(ChannelId::new(31).unwrap().index(), 31);
        assert_eq!(ChannelId::new(32), Err(MailboxError::InvalidChannel(32)));
        assert_eq!(ChannelId::new(0xffff_ffff), Err(MailboxError::InvalidChannel(0xffff_ffff)));
        assert_eq!(ChannelId::all().count(), NUM_CHANNELS);
    }

    #[test]
    fn display_names_known_masters() {
        assert_eq!(MasterId::ARM0.to_string(), "arm0");
        assert_eq!(MasterId::new(7).unwrap().to_string(), "master7");
        assert_eq!(ChannelId::new(5).unwrap().to_string(), "ch5");
    }
}
