// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Inter-processor mailbox driver for Axera SoCs
//! OWNERS: @bsp
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: unit tests per module, integration tests under tests/
//!
//! PUBLIC API:
//!   - Mailbox: channel binding, send path, interrupt receive path, power
//!   - Dispatcher: handler registration and inline or deferred delivery (std)
//!   - MailboxConfig: TOML platform description (std)
//!   - SimMailbox: software model of the block for host tests (std)
//!   - MailboxError: error type for every fallible operation
//!
//! DEPENDENCIES:
//!   - ax-hal::{Bus, ClockGate}: register access and clock gating
//!   - ax-sync::SpinLock: per-channel send critical section
//!
//! Without `std` the controller, register map and message types build for
//! bare-metal targets; delivery threads, config loading and the model need it.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

mod channel;
mod controller;
mod error;
mod id;
mod message;
pub mod power;
pub mod regs;

#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "std")]
pub mod dispatch;
#[cfg(feature = "std")]
pub mod sim;

pub use channel::{Binding, Channel};
pub use controller::{Inbound, IrqOutcome, Mailbox};
pub use error::{MailboxError, Result};
pub use id::{ChannelId, MasterId, MAX_MASTERS, NUM_CHANNELS};
pub use message::{Message, MSG_LEN};
pub use power::{NoClock, SysCtlClock};
pub use regs::InfoWord;

#[cfg(feature = "std")]
pub use config::{ConfigError, DeliveryMode, MailboxConfig};
#[cfg(feature = "std")]
pub use dispatch::{Delivery, DispatchStats, Dispatcher, DispatcherBuilder, MessageHandler};
#[cfg(feature = "std")]
pub use sim::SimMailbox;
