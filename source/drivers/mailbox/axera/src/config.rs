// Copyright 2024 Axera BSP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Platform configuration for one mailbox instance, loaded from TOML.
//!
//! ```toml
//! base_addr = 0x4610000
//! irq = 46
//! local_master = 0
//! delivery = "deferred"
//! queue_depth = 64
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ax_hal::Bus;
use log::info;
use serde::{Deserialize, Serialize};

use crate::controller::Mailbox;
use crate::dispatch::Delivery;
use crate::id::{MasterId, MAX_MASTERS};
use crate::power::{SysCtlClock, SYSCTL_BASE, SYSCTL_LEN};
use crate::regs::WINDOW_LEN;

/// How inbound messages reach the registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Call the handler from the interrupt path.
    Inline,
    /// Queue to a worker thread.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailboxConfig {
    /// Physical base of the mailbox register window.
    pub base_addr: u64,
    pub irq: u32,
    /// Master id this instance receives as.
    pub local_master: u32,
    /// Physical base of the system controller holding the clock gate.
    pub sysctl_base: u64,
    pub delivery: DeliveryMode,
    /// Capacity of the deferred delivery queue.
    pub queue_depth: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            base_addr: 0,
            irq: 0,
            local_master: MasterId::ARM0.raw(),
            sysctl_base: SYSCTL_BASE,
            delivery: DeliveryMode::Deferred,
            queue_depth: 64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed mailbox config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid mailbox config: {0}")]
    Invalid(&'static str),
    #[error("cannot map {what} window at {phys:#x}")]
    Unmapped { what: &'static str, phys: u64 },
}

impl MailboxConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_master >= MAX_MASTERS {
            return Err(ConfigError::Invalid("local_master must be below 16"));
        }
        if self.delivery == DeliveryMode::Deferred && self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue_depth must be non-zero"));
        }
        Ok(())
    }

    pub fn local_master(&self) -> Result<MasterId, ConfigError> {
        MasterId::new(self.local_master).map_err(|_| ConfigError::Invalid("local_master must be below 16"))
    }

    /// Maps the mailbox and system controller windows and brings the
    /// controller up with its clock ungated.
    ///
    /// `map` gets a physical base and a window length. On targets with
    /// identity-mapped devices it is `|phys, len| unsafe { MmioBus::from_phys(phys, len) }`.
    /// Hooking up `irq` is left to the platform's interrupt layer.
    pub fn open<B, F>(&self, mut map: F) -> Result<Mailbox<B, SysCtlClock<B>>, ConfigError>
    where
        B: Bus,
        F: FnMut(u64, usize) -> Option<B>,
    {
        self.validate()?;
        if self.base_addr == 0 {
            return Err(ConfigError::Invalid("base_addr is not set"));
        }
        let local = self.local_master()?;
        let regs = map(self.base_addr, WINDOW_LEN)
            .ok_or(ConfigError::Unmapped { what: "mailbox", phys: self.base_addr })?;
        let sysctl = map(self.sysctl_base, SYSCTL_LEN)
            .ok_or(ConfigError::Unmapped { what: "sysctl", phys: self.sysctl_base })?;
        info!("mailbox: {local} at {:#x}, irq {}", self.base_addr, self.irq);
        Ok(Mailbox::with_clock(regs, SysCtlClock::new(sysctl), local))
    }

    pub fn delivery(&self) -> Delivery {
        match self.delivery {
            DeliveryMode::Inline => Delivery::Inline,
            DeliveryMode::Deferred => Delivery::Deferred { depth: self.queue_depth },
        }
    }
}
