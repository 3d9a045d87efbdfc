// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Channel table and slot resolver.
//!
//! Each of the 32 hardware slots has a software entry guarded by its own
//! spin lock. The lock doubles as the per-channel send critical section, so
//! two producers can never interleave payload writes within one slot.

use ax_hal::Bus;
use ax_sync::{SpinLock, SpinLockGuard};
use log::trace;

use crate::error::{MailboxError, Result};
use crate::id::{ChannelId, MasterId, NUM_CHANNELS};
use crate::regs::{self, SEARCH_NONE};

/// The (sender, receiver) pair a slot is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    pub sender: MasterId,
    pub receiver: MasterId,
}

/// Handle to a bound channel, returned by `Mailbox::bind_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    id: ChannelId,
    binding: Binding,
}

impl Channel {
    pub(crate) fn new(id: ChannelId, binding: Binding) -> Self {
        Self { id, binding }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn sender(&self) -> MasterId {
        self.binding.sender
    }

    pub fn receiver(&self) -> MasterId {
        self.binding.receiver
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }
}

pub(crate) type SlotGuard<'a> = SpinLockGuard<'a, Option<Binding>>;

pub(crate) struct ChannelTable {
    slots: [SpinLock<Option<Binding>>; NUM_CHANNELS],
}

impl ChannelTable {
    pub(crate) fn new() -> Self {
        Self { slots: core::array::from_fn(|_| SpinLock::new(None)) }
    }

    /// Locks the entry of `ch`; the guard is the send critical section.
    pub(crate) fn lock(&self, ch: ChannelId) -> SlotGuard<'_> {
        self.slots[ch.index()].lock()
    }

    pub(crate) fn binding(&self, ch: ChannelId) -> Option<Binding> {
        *self.lock(ch)
    }

    pub(crate) fn bound(&self) -> impl Iterator<Item = Channel> + '_ {
        ChannelId::all().filter_map(|ch| self.binding(ch).map(|binding| Channel::new(ch, binding)))
    }
}

/// Asks the hardware for a free slot on behalf of `sender`.
///
/// The read itself locks the returned slot for `sender`.
pub(crate) fn search<B: Bus>(bus: &B, sender: MasterId) -> Result<ChannelId> {
    let raw = bus.read(regs::search(sender));
    if raw == SEARCH_NONE {
        return Err(MailboxError::NoFreeChannel { sender });
    }
    let ch = ChannelId::new(raw)?;
    trace!("mailbox: search for {sender} -> {ch}");
    Ok(ch)
}
