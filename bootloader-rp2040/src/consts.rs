// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Flash geometry and identity of the RP2040 port (2 MiB Pico-class board).

/// XIP window base.
pub const FLASH_START: u32 = 0x1000_0000;
pub const FLASH_SIZE: u32 = 2 * 1024 * 1024;

/// Protocol pages are RP2040 erase sectors. The SDK's 256-byte "page" is the
/// program granule, not the erase unit.
pub const FLASH_PAGE_SIZE: u32 = 4096;

/// Bootloader occupies the first 128 KiB (kept in sync with `build.rs`).
pub const FLASH_APP_FIRST_PAGE: u32 = 32;
pub const FLASH_APP_START: u32 = FLASH_START + FLASH_APP_FIRST_PAGE * FLASH_PAGE_SIZE;

pub const RAM_BASE: u32 = 0x2000_0000;

/// Raspberry Pi vendor ID with the pico-sdk CDC product ID.
pub const USB_VID: u16 = 0x2E8A;
pub const USB_PID: u16 = 0x000A;

/// Device identification words (vendor ID, product ID, production date,
/// reserved). Lives in its own flash section so the factory flasher can
/// program it; reads all-ones until then.
#[used]
#[link_section = ".dev_ident"]
pub static DEVICE_IDENT: [u32; 4] = [0xFFFF_FFFF; 4];
