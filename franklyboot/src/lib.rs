// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Platform-neutral core of the Frankly bootloader.
//!
//! The board crates own the transports and the flash peripheral; this crate
//! owns everything in between: the page-buffered write protocol, the command
//! handlers, application validation and the autoboot decision. All hardware
//! access goes through the [`hardware::Hardware`] trait, so the whole engine
//! runs unchanged against the in-memory simulator used by the tests.

#![no_std]

pub mod app_check;
pub mod autoboot;
pub mod frame;
pub mod handler;
pub mod hardware;
pub mod page_buffer;
pub mod ring;
pub mod sim;

pub use app_check::is_app_valid;
pub use autoboot::BootArbiter;
pub use frame::FrameAssembler;
pub use handler::{Handler, SideEffect};
pub use hardware::Hardware;
pub use page_buffer::PageBuffer;
pub use ring::ByteRing;

use crc::{Crc, CRC_32_ISO_HDLC};

/// CRC-32/ISO-HDLC engine used for page verification and the application
/// footer. Boards with a hardware CRC unit must produce identical results.
pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
