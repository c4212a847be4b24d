// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Resident-application validation.
//!
//! An installable image ends with a CRC-32 footer in the last 4 bytes of the
//! application region, computed over everything before it. Validation is a
//! pure function of flash contents and is recomputed on every query; nothing
//! is cached across writes.

use crate::hardware::Hardware;

/// Cortex-M SRAM window accepted for the image's initial stack pointer.
/// Wide enough for every supported part (2 KiB .. 1 MiB of RAM).
const RAM_WINDOW_START: u32 = 0x2000_0000;
const RAM_WINDOW_END: u32 = 0x2010_0000;

/// Address of the 32-bit CRC footer (last word of flash).
pub fn footer_addr<H: Hardware>() -> u32 {
    H::FLASH_START + H::FLASH_SIZE - 4
}

/// CRC stored by the flasher in the image footer.
pub fn stored_crc<H: Hardware>(hw: &H) -> u32 {
    hw.read_word(footer_addr::<H>())
}

/// CRC recomputed over the application region, footer excluded.
pub fn calculated_crc<H: Hardware>(hw: &H) -> u32 {
    hw.crc32(H::FLASH_APP_START, H::FLASH_APP_SIZE - 4)
}

/// Whether the resident application may be started.
///
/// Checks, in order: the initial stack pointer points into RAM, the reset
/// vector (Thumb bit masked) points into the application region, and the
/// recomputed CRC matches the stored footer. The vector checks keep an image
/// with a forged footer from being jumped into blind; the CRC covers both
/// vectors anyway, so a bit flip anywhere fails validation.
pub fn is_app_valid<H: Hardware>(hw: &H) -> bool {
    let stack_pointer = hw.read_word(H::FLASH_APP_START);
    if !(RAM_WINDOW_START..RAM_WINDOW_END).contains(&stack_pointer) {
        return false;
    }

    let reset_vector = hw.read_word(H::FLASH_APP_START + 4) & !1;
    if !(H::FLASH_APP_START..footer_addr::<H>()).contains(&reset_vector) {
        return false;
    }

    calculated_crc(hw) == stored_crc(hw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{self, SimFlash};

    #[test]
    fn pristine_flash_is_invalid() {
        let flash = SimFlash::new();
        assert!(!is_app_valid(&flash));
    }

    #[test]
    fn installed_image_is_valid() {
        let mut flash = SimFlash::new();
        flash.load_app_image(&sim::example_app_image());
        assert!(is_app_valid(&flash));
        assert_eq!(calculated_crc(&flash), stored_crc(&flash));
    }

    #[test]
    fn stack_pointer_outside_ram_is_invalid() {
        let mut flash = SimFlash::new();
        let mut image = sim::example_app_image();
        // Flash address instead of RAM; fix the footer so only the stack
        // pointer check can reject it.
        image[..4].copy_from_slice(&0x0800_4000u32.to_le_bytes());
        sim::seal_app_image(&mut image);
        flash.load_app_image(&image);
        assert!(!is_app_valid(&flash));
    }

    #[test]
    fn reset_vector_outside_app_region_is_invalid() {
        let mut flash = SimFlash::new();
        let mut image = sim::example_app_image();
        // Points at the bootloader region.
        image[4..8].copy_from_slice(&(SimFlash::FLASH_START + 1).to_le_bytes());
        sim::seal_app_image(&mut image);
        flash.load_app_image(&image);
        assert!(!is_app_valid(&flash));
    }

    #[test]
    fn any_single_bit_flip_invalidates() {
        let base = sim::example_app_image();

        // Sampling the image: vectors, payload spread, and the footer.
        let mut offsets = [0usize; 16];
        let mut n = 0;
        for probe in [0, 4, 8, 9, 100, base.len() - 4, base.len() - 1] {
            offsets[n] = probe;
            n += 1;
        }
        let mut probe = 1021;
        while n < offsets.len() {
            offsets[n] = probe % base.len();
            probe += base.len() / 7;
            n += 1;
        }

        for offset in offsets {
            for bit in 0..8 {
                let mut flash = SimFlash::new();
                let mut image = base;
                image[offset] ^= 1 << bit;
                flash.load_app_image(&image);
                assert!(
                    !is_app_valid(&flash),
                    "bit {} of byte {} did not invalidate",
                    bit,
                    offset
                );
            }
        }
    }
}
