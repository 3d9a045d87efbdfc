// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Software model of the mailbox block for host tests and demos
//! OWNERS: @bsp
//! STATUS: Functional
//!
//! MODEL:
//!   - search locks the lowest free slot for the sender, or returns the sentinel
//!   - payload writes fill the slot FIFO; a 9th word raises WR_FULL on the owner
//!   - an info write latches the word and queues a NORMAL event on the receiver,
//!     or raises ERR_SLAVE on the sender if the receiver doesn't exist
//!   - payload reads drain the FIFO; an empty read raises RD_EMPTY on the receiver
//!   - draining a delivered slot, or an unlock by its owner, frees the slot
//!   - INT_STATS shows the oldest NORMAL event plus sticky error bits; INT_CLR
//!     retires the NORMAL event and clears the named error bits
//!
//! Every register access is one critical section, so masters on different
//! threads see the same serialisation the bus gives real cores.

use std::collections::VecDeque;
use std::time::Duration;

use ax_hal::Bus;
use parking_lot::{Condvar, Mutex};

use crate::id::{ChannelId, MasterId, MAX_MASTERS, NUM_CHANNELS};
use crate::regs::{IntEvents, IntStatus, Register, MSG_WORDS, SEARCH_NONE};

/// Direction of a recorded register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

/// One recorded register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub op: Op,
    pub offset: usize,
    pub value: u32,
}

impl Access {
    pub fn register(&self) -> Option<Register> {
        Register::decode(self.offset)
    }
}

#[derive(Default)]
struct Slot {
    owner: Option<MasterId>,
    fifo: VecDeque<u32>,
    info: u32,
    delivered: bool,
}

impl Slot {
    fn free(&mut self) {
        self.owner = None;
        self.fifo.clear();
        self.delivered = false;
    }
}

#[derive(Default)]
struct MasterLine {
    pending: VecDeque<ChannelId>,
    errors: IntEvents,
}

impl MasterLine {
    fn asserted(&self) -> bool {
        !self.pending.is_empty() || !self.errors.is_empty()
    }
}

struct State {
    slots: [Slot; NUM_CHANNELS],
    lines: [MasterLine; MAX_MASTERS as usize],
    record: bool,
    log: Vec<Access>,
}

/// Shared model of the mailbox block; every master's `Mailbox` uses it as its bus.
pub struct SimMailbox {
    masters: u32,
    state: Mutex<State>,
    irq: Condvar,
}

impl SimMailbox {
    /// Model with `masters` cores attached (the hardware's master count).
    pub fn new(masters: u32) -> Self {
        Self {
            masters: masters.min(MAX_MASTERS),
            state: Mutex::new(State {
                slots: Default::default(),
                lines: Default::default(),
                record: false,
                log: Vec::new(),
            }),
            irq: Condvar::new(),
        }
    }

    /// Starts or stops recording register accesses.
    pub fn record_accesses(&self, on: bool) {
        self.state.lock().record = on;
    }

    /// Returns and clears the recorded accesses.
    pub fn take_log(&self) -> Vec<Access> {
        std::mem::take(&mut self.state.lock().log)
    }

    pub fn owner(&self, ch: ChannelId) -> Option<MasterId> {
        self.state.lock().slots[ch.index()].owner
    }

    pub fn fifo_len(&self, ch: ChannelId) -> usize {
        self.state.lock().slots[ch.index()].fifo.len()
    }

    pub fn free_slots(&self) -> usize {
        self.state.lock().slots.iter().filter(|slot| slot.owner.is_none()).count()
    }

    /// Whether `master`'s interrupt line is asserted.
    pub fn irq_pending(&self, master: MasterId) -> bool {
        self.state.lock().lines[master.index()].asserted()
    }

    /// Blocks until `master`'s line is asserted or `timeout` passes.
    pub fn wait_irq(&self, master: MasterId, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        let line = master.index();
        let _ = self.irq.wait_while_for(&mut state, |state| !state.lines[line].asserted(), timeout);
        state.lines[line].asserted()
    }

    /// Wakes every waiter, e.g. so service threads can notice shutdown.
    pub fn kick(&self) {
        self.irq.notify_all();
    }

    fn raise(&self, state: &mut State, master: MasterId, events: IntEvents) {
        state.lines[master.index()].errors |= events;
        self.irq.notify_all();
    }

    fn read_register(&self, state: &mut State, reg: Register) -> u32 {
        match reg {
            Register::Data(ch) => {
                let slot = &mut state.slots[ch.index()];
                match slot.fifo.pop_front() {
                    Some(word) => {
                        if slot.fifo.is_empty() && slot.delivered {
                            slot.free();
                        }
                        word
                    }
                    None => {
                        let receiver = MasterId::new(slot.info >> 28).ok();
                        if let Some(receiver) = receiver {
                            self.raise(state, receiver, IntEvents::RD_EMPTY);
                        }
                        0
                    }
                }
            }
            Register::Info(ch) => state.slots[ch.index()].info,
            Register::IntStats(master) => {
                let line = &state.lines[master.index()];
                let errors = line.errors.bits();
                match line.pending.front() {
                    Some(ch) => IntStatus::new(IntEvents::NORMAL, *ch).0 | errors,
                    None => errors,
                }
            }
            Register::Search(master) => {
                match state.slots.iter_mut().enumerate().find(|(_, slot)| slot.owner.is_none()) {
                    Some((index, slot)) => {
                        slot.free();
                        slot.owner = Some(master);
                        index as u32
                    }
                    None => SEARCH_NONE,
                }
            }
            Register::IntClr(_) | Register::Unlock(_) => 0,
        }
    }

    fn write_register(&self, state: &mut State, reg: Register, value: u32) {
        match reg {
            Register::Data(ch) => {
                let slot = &mut state.slots[ch.index()];
                if slot.fifo.len() < MSG_WORDS {
                    slot.fifo.push_back(value);
                } else if let Some(owner) = slot.owner {
                    self.raise(state, owner, IntEvents::WR_FULL);
                }
            }
            Register::Info(ch) => {
                let receiver = value >> 28;
                let sender = (value >> 24) & 0xf;
                state.slots[ch.index()].info = value;
                match MasterId::new(receiver) {
                    Ok(receiver) if receiver.raw() < self.masters => {
                        state.slots[ch.index()].delivered = true;
                        state.lines[receiver.index()].pending.push_back(ch);
                        self.irq.notify_all();
                    }
                    _ => {
                        if let Ok(sender) = MasterId::new(sender) {
                            self.raise(state, sender, IntEvents::ERR_SLAVE);
                        }
                    }
                }
            }
            Register::IntClr(master) => {
                let line = &mut state.lines[master.index()];
                let clear = IntEvents::from_bits_truncate(value);
                if clear.contains(IntEvents::NORMAL) {
                    line.pending.pop_front();
                }
                line.errors.remove(clear);
            }
            Register::Unlock(master) => {
                if let Ok(ch) = ChannelId::new(value) {
                    let slot = &mut state.slots[ch.index()];
                    if slot.owner == Some(master) {
                        slot.free();
                    }
                }
            }
            Register::IntStats(_) | Register::Search(_) => {}
        }
    }
}

impl Bus for SimMailbox {
    fn read(&self, offset: usize) -> u32 {
        let mut state = self.state.lock();
        let value = match Register::decode(offset) {
            Some(reg) => self.read_register(&mut state, reg),
            None => 0,
        };
        if state.record {
            state.log.push(Access { op: Op::Read, offset, value });
        }
        value
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = self.state.lock();
        if let Some(reg) = Register::decode(offset) {
            self.write_register(&mut state, reg, value);
        }
        if state.record {
            state.log.push(Access { op: Op::Write, offset, value });
        }
    }
}
