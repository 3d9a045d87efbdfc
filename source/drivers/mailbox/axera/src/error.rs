// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::id::MasterId;

/// Result alias for mailbox operations.
pub type Result<T> = core::result::Result<T, MailboxError>;

/// Errors produced by the mailbox controller and dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    /// The search register reported that every slot is locked.
    #[error("no available channel for sender master {sender}")]
    NoFreeChannel { sender: MasterId },
    /// A channel index outside `0..32`.
    #[error("channel index {0} out of range")]
    InvalidChannel(u32),
    /// A master id that does not fit the 4-bit info-word field.
    #[error("master id {0} out of range")]
    InvalidMaster(u32),
    /// The channel handle no longer matches the channel table.
    #[error("channel {0} is not bound")]
    ChannelNotBound(u8),
    /// The controller clock is gated.
    #[error("mailbox is suspended")]
    Suspended,
    /// The deferred delivery worker has exited.
    #[error("delivery worker is gone")]
    WorkerGone,
}
