// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Autoboot arbitration.
//!
//! After reset the bootloader waits roughly one second; if a valid
//! application is resident, no host has spoken and the application did not
//! request to stay in boot mode, control transfers automatically. The flags
//! live in atomics because the timer expiry arrives from interrupt context;
//! relaxed ordering suffices since each flag is only ever set from one side
//! and observed from the other.

use core::sync::atomic::{AtomicBool, Ordering};

use host_protocol::RequestType;

/// Boot-time decision state shared between the main loop and the one-shot
/// autoboot timer.
pub struct BootArbiter {
    autoboot_possible: AtomicBool,
    autoboot_requested: AtomicBool,
    override_key_observed: AtomicBool,
}

impl BootArbiter {
    pub const fn new() -> Self {
        Self {
            autoboot_possible: AtomicBool::new(false),
            autoboot_requested: AtomicBool::new(false),
            override_key_observed: AtomicBool::new(false),
        }
    }

    /// Called once at boot, after the scratch register has been read and
    /// cleared and the resident application has been validated.
    pub fn init(&self, app_valid: bool, override_key_observed: bool) {
        self.override_key_observed
            .store(override_key_observed, Ordering::Relaxed);
        self.autoboot_possible
            .store(app_valid && !override_key_observed, Ordering::Relaxed);
        self.autoboot_requested.store(false, Ordering::Relaxed);
    }

    /// A host probing for the bootloader cancels autoboot for this session.
    pub fn observe_request(&self, request: RequestType) {
        if matches!(
            request,
            RequestType::Ping | RequestType::DevInfoBootloaderVersion
        ) {
            self.autoboot_possible.store(false, Ordering::Relaxed);
        }
    }

    /// One-shot timer expiry (interrupt or timer-task context).
    pub fn timer_expired(&self) {
        self.autoboot_requested.store(true, Ordering::Relaxed);
    }

    /// Checked by the main loop between frames.
    pub fn should_launch(&self) -> bool {
        self.autoboot_requested.load(Ordering::Relaxed)
            && self.autoboot_possible.load(Ordering::Relaxed)
    }

    /// Whether the application requested to stay in boot mode via the
    /// persistent scratch register.
    pub fn override_key_observed(&self) -> bool {
        self.override_key_observed.load(Ordering::Relaxed)
    }
}

impl Default for BootArbiter {
    fn default() -> Self {
        Self::new()
    }
}
