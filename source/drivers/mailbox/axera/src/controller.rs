// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Mailbox controller: channel binding, send path, receive path
//! OWNERS: @bsp
//! STATUS: Functional
//!
//! SEND INVARIANTS:
//!   - Eight payload words, then the info word, all under the slot's lock
//!   - A search sentinel fails the operation; no write reaches the bus
//!
//! RECEIVE INVARIANTS:
//!   - Any status with event bits is acknowledged exactly once
//!   - Only a status whose nibble is exactly NORMAL touches the payload FIFO
//!   - A zero nibble is logged at debug level and left unacknowledged

use core::sync::atomic::{AtomicBool, Ordering};

use ax_hal::{Bus, ClockGate};
use log::{debug, error, info, trace, warn};

use crate::channel::{self, Binding, Channel, ChannelTable};
use crate::error::{MailboxError, Result};
use crate::id::{ChannelId, MasterId};
use crate::message::Message;
use crate::power::NoClock;
use crate::regs::{self, InfoWord, IntStatus, MSG_BYTES, MSG_WORDS};

/// A message copied out of a slot by the receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inbound {
    /// Slot the message arrived in.
    pub channel: ChannelId,
    /// Raw info word latched for the slot.
    pub info: u32,
    pub message: Message,
}

impl Inbound {
    pub fn info(&self) -> Result<InfoWord> {
        InfoWord::decode(self.info)
    }

    pub fn sender(&self) -> Option<MasterId> {
        self.info().ok().map(|info| info.sender)
    }
}

/// Result of servicing one interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// No event bits were set; nothing was acknowledged.
    Spurious,
    /// Error bits were set; the status was acknowledged and dropped.
    Malformed(IntStatus),
    Message(Inbound),
}

/// Driver for one master's view of the mailbox block.
pub struct Mailbox<B: Bus, C: ClockGate = NoClock> {
    bus: B,
    clock: C,
    local: MasterId,
    table: ChannelTable,
    suspended: AtomicBool,
}

impl<B: Bus> Mailbox<B, NoClock> {
    /// Controller whose clock is managed elsewhere.
    pub fn new(bus: B, local: MasterId) -> Self {
        Self::with_clock(bus, NoClock, local)
    }
}

impl<B: Bus, C: ClockGate> Mailbox<B, C> {
    /// Ungates the block and returns a controller receiving as `local`.
    pub fn with_clock(bus: B, clock: C, local: MasterId) -> Self {
        clock.enable();
        info!("mailbox: enabled for {local}");
        Self { bus, clock, local, table: ChannelTable::new(), suspended: AtomicBool::new(false) }
    }

    pub fn local(&self) -> MasterId {
        self.local
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    pub fn suspend(&self) {
        if !self.suspended.swap(true, Ordering::AcqRel) {
            self.clock.disable();
            debug!("mailbox: suspended");
        }
    }

    pub fn resume(&self) {
        if self.suspended.load(Ordering::Acquire) {
            self.clock.enable();
            self.suspended.store(false, Ordering::Release);
            debug!("mailbox: resumed");
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_suspended() {
            return Err(MailboxError::Suspended);
        }
        Ok(())
    }

    /// Resolves a slot for `(sender, receiver)` and records the binding.
    pub fn bind_channel(&self, sender: MasterId, receiver: MasterId) -> Result<Channel> {
        self.ensure_running()?;
        let ch = channel::search(&self.bus, sender)?;
        let binding = Binding { sender, receiver };
        let mut slot = self.table.lock(ch);
        if let Some(previous) = slot.replace(binding) {
            warn!("mailbox: {ch} was bound to {}->{}, rebinding", previous.sender, previous.receiver);
        }
        debug!("mailbox: bound {ch} {sender}->{receiver}");
        Ok(Channel::new(ch, binding))
    }

    /// Drops a binding and hands the slot back to the hardware.
    pub fn release_channel(&self, channel: &Channel) -> Result<()> {
        self.ensure_running()?;
        let ch = channel.id();
        let mut slot = self.table.lock(ch);
        if *slot != Some(channel.binding()) {
            return Err(MailboxError::ChannelNotBound(ch.raw() as u8));
        }
        self.bus.write(regs::unlock(channel.sender()), ch.raw());
        *slot = None;
        debug!("mailbox: released {ch}");
        Ok(())
    }

    pub fn bound_channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.table.bound()
    }

    /// Sends on a channel obtained from [`Mailbox::bind_channel`].
    pub fn send(&self, channel: &Channel, msg: &Message) -> Result<()> {
        self.ensure_running()?;
        let ch = channel.id();
        let slot = self.table.lock(ch);
        if *slot != Some(channel.binding()) {
            return Err(MailboxError::ChannelNotBound(ch.raw() as u8));
        }
        self.write_slot(ch, InfoWord::new(channel.sender(), channel.receiver(), ch), msg);
        drop(slot);
        Ok(())
    }

    /// One-shot send: searches a slot for `sender` and fires the message.
    ///
    /// Returns the slot used. Fails closed when no slot is free.
    pub fn send_message(&self, sender: MasterId, receiver: MasterId, msg: &Message) -> Result<ChannelId> {
        self.ensure_running()?;
        let ch = channel::search(&self.bus, sender)?;
        let slot = self.table.lock(ch);
        self.write_slot(ch, InfoWord::new(sender, receiver, ch), msg);
        drop(slot);
        Ok(ch)
    }

    // Caller holds the slot lock.
    fn write_slot(&self, ch: ChannelId, info: InfoWord, msg: &Message) {
        let fifo = regs::data(ch);
        for word in msg.words() {
            self.bus.write(fifo, *word);
        }
        self.bus.write(regs::info(ch), info.encode());
        trace!("mailbox: {}->{} on {ch} info={:#010x}", info.sender, info.receiver, info.encode());
    }

    /// Services the local master's interrupt once.
    pub fn handle_irq(&self) -> IrqOutcome {
        if self.is_suspended() {
            debug!("mailbox: interrupt while suspended");
            return IrqOutcome::Spurious;
        }
        let status = IntStatus(self.bus.read(regs::int_stats(self.local)));
        if status.nibble() == 0 {
            debug!("mailbox: spurious interrupt for {}, status {:#x}", self.local, status.0);
            return IrqOutcome::Spurious;
        }
        // Acknowledge before anything else so a bad status can't storm.
        self.bus.write(regs::int_clr(self.local), status.nibble());
        if !status.is_normal() {
            error!("mailbox: int error {:#x} ({:?})", status.0, status.events());
            return IrqOutcome::Malformed(status);
        }

        let ch = status.slot();
        let info = self.bus.read(regs::info(ch));
        let fifo = regs::data(ch);
        let mut words = [0u32; MSG_WORDS];
        for word in words.iter_mut() {
            *word = self.bus.read(fifo);
        }
        if info & 0xffff != MSG_BYTES {
            warn!("mailbox: {ch} info length {} != {MSG_BYTES}", info & 0xffff);
        }
        trace!("mailbox: received on {ch} info={info:#010x}");
        IrqOutcome::Message(Inbound { channel: ch, info, message: Message::from_words(words) })
    }
}

impl<B: Bus, C: ClockGate> Drop for Mailbox<B, C> {
    fn drop(&mut self) {
        if !self.is_suspended() {
            self.clock.disable();
        }
    }
}
