// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Mailbox clock gating in the flash-subsystem system controller.

use ax_hal::{Bus, ClockGate};
use log::debug;

/// Physical base of the system controller window holding the gate bits.
pub const SYSCTL_BASE: u64 = 0x1003_0000;

/// Size of the system controller window.
pub const SYSCTL_LEN: usize = 0x1_0000;

// (offset, value) writes, in order. The bit positions differ between the
// set and clear banks.
const ENABLE_SEQ: [(usize, u32); 2] = [(0x4008, 1 << 15), (0x8014, 1 << 13)];
const DISABLE_SEQ: [(usize, u32); 2] = [(0x4014, 1 << 13), (0x8008, 1 << 15)];

/// Gate for platforms where firmware owns the mailbox clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl ClockGate for NoClock {
    fn enable(&self) {}

    fn disable(&self) {}
}

/// Clock and reset control for the mailbox, through set/clear registers.
pub struct SysCtlClock<B: Bus> {
    bus: B,
}

impl<B: Bus> SysCtlClock<B> {
    /// `bus` must address the window at [`SYSCTL_BASE`].
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B: Bus> ClockGate for SysCtlClock<B> {
    fn enable(&self) {
        for (offset, value) in ENABLE_SEQ {
            self.bus.write(offset, value);
        }
        debug!("mailbox: clock on");
    }

    fn disable(&self) {
        for (offset, value) in DISABLE_SEQ {
            self.bus.write(offset, value);
        }
        debug!("mailbox: clock off");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct WriteLog(RefCell<Vec<(usize, u32)>>);

    impl Bus for WriteLog {
        fn read(&self, _offset: usize) -> u32 {
            0
        }

        fn write(&self, offset: usize, value: u32) {
            self.0.borrow_mut().push((offset, value));
        }
    }

    #[test]
    fn enable_sequence() {
        let log = WriteLog::default();
        SysCtlClock::new(&log).enable();
        assert_eq!(*log.0.borrow(), vec![(0x4008, 1 << 15), (0x8014, 1 << 13)]);
    }

    #[test]
    fn disable_sequence() {
        let log = WriteLog::default();
        SysCtlClock::new(&log).disable();
        assert_eq!(*log.0.borrow(), vec![(0x4014, 1 << 13), (0x8008, 1 << 15)]);
    }
}
