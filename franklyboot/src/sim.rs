// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory NOR flash model.
//!
//! Drives the whole engine without hardware: erase sets `0xFF`, programming
//! only clears bits, and erase/program failures can be injected per call.
//! Geometry matches a small STM32-class part (32 KiB, 2 KiB pages, 8-byte
//! program granule, bootloader in the first four pages).

use crate::hardware::Hardware;
use crate::CRC32;

const FLASH_START: u32 = 0x0800_0000;
const PAGE_SIZE: usize = 2048;
const NUM_PAGES: usize = 16;
const FLASH_SIZE: usize = NUM_PAGES * PAGE_SIZE;
const APP_FIRST_PAGE: u32 = 4;
const GRANULE: usize = 8;

/// Size of a full application image for the simulated device.
pub const APP_IMAGE_SIZE: usize = FLASH_SIZE - APP_FIRST_PAGE as usize * PAGE_SIZE;

pub struct SimFlash {
    storage: [u8; FLASH_SIZE],
    erase_counts: [u32; NUM_PAGES],
    /// Fail the next `erase_page` call, then clear.
    pub fail_next_erase: bool,
    /// Fail the next `write_page` call, then clear.
    pub fail_next_write: bool,
    /// Let the next `write_page` succeed but flip one bit, then clear.
    pub corrupt_next_write: bool,
}

impl SimFlash {
    pub const VENDOR_ID: u32 = 0x0000_0042;
    pub const PRODUCT_ID: u32 = 0x0000_0815;
    pub const PRODUCTION_DATE: u32 = 0x2025_1104;
    pub const UNIQUE_ID: [u32; 3] = [0x1234_5678, 0x9ABC_DEF0, 0x0BAD_CAFE];

    pub fn new() -> Self {
        Self {
            storage: [0xFF; FLASH_SIZE],
            erase_counts: [0; NUM_PAGES],
            fail_next_erase: false,
            fail_next_write: false,
            corrupt_next_write: false,
        }
    }

    /// Copy a prebuilt image straight into the application region,
    /// bypassing the NOR programming rules. Test setup only.
    pub fn load_app_image(&mut self, image: &[u8]) {
        let offset = (Self::FLASH_APP_START - FLASH_START) as usize;
        self.storage[offset..offset + image.len()].copy_from_slice(image);
    }

    pub fn page_bytes(&self, page_id: u32) -> &[u8] {
        let offset = page_id as usize * PAGE_SIZE;
        &self.storage[offset..offset + PAGE_SIZE]
    }

    pub fn read_range(&self, addr: u32, len: usize) -> &[u8] {
        let offset = (addr - FLASH_START) as usize;
        &self.storage[offset..offset + len]
    }

    pub fn erase_count(&self, page_id: u32) -> u32 {
        self.erase_counts[page_id as usize]
    }
}

impl Default for SimFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl Hardware for SimFlash {
    const FLASH_START: u32 = FLASH_START;
    const FLASH_APP_FIRST_PAGE: u32 = APP_FIRST_PAGE;
    const FLASH_SIZE: u32 = FLASH_SIZE as u32;
    const FLASH_PAGE_SIZE: u32 = PAGE_SIZE as u32;

    fn erase_page(&mut self, page_id: u32) -> bool {
        if self.fail_next_erase {
            self.fail_next_erase = false;
            return false;
        }
        let offset = page_id as usize * PAGE_SIZE;
        self.storage[offset..offset + PAGE_SIZE].fill(0xFF);
        self.erase_counts[page_id as usize] += 1;
        true
    }

    fn write_page(&mut self, addr: u32, page_id: u32, data: &[u8]) -> bool {
        if self.fail_next_write {
            self.fail_next_write = false;
            return false;
        }
        let offset = (addr - FLASH_START) as usize;
        debug_assert!(offset % GRANULE == 0);
        debug_assert!(!data.is_empty() && data.len() % GRANULE == 0);
        debug_assert!(offset / PAGE_SIZE == page_id as usize);
        debug_assert!((offset + data.len() - 1) / PAGE_SIZE == page_id as usize);

        // NOR programming can only clear bits.
        for (slot, &byte) in self.storage[offset..offset + data.len()].iter_mut().zip(data) {
            *slot &= byte;
        }
        if self.corrupt_next_write {
            self.corrupt_next_write = false;
            // Models a read-back mismatch, so a plain bit flip is enough.
            self.storage[offset + data.len() / 2] ^= 0x10;
        }
        true
    }

    fn read_byte(&self, addr: u32) -> u8 {
        self.storage[(addr - FLASH_START) as usize]
    }

    fn crc32(&self, addr: u32, num_bytes: u32) -> u32 {
        debug_assert!(num_bytes % 4 == 0);
        let offset = (addr - FLASH_START) as usize;
        CRC32.checksum(&self.storage[offset..offset + num_bytes as usize])
    }

    fn unique_id_word(&self, idx: u32) -> u32 {
        match Self::UNIQUE_ID.get(idx as usize) {
            Some(&word) => word,
            None => 0,
        }
    }

    fn vendor_id(&self) -> u32 {
        Self::VENDOR_ID
    }

    fn product_id(&self) -> u32 {
        Self::PRODUCT_ID
    }

    fn production_date(&self) -> u32 {
        Self::PRODUCTION_DATE
    }

    fn reset_device(&mut self) -> ! {
        // The protocol loop owns side-effect execution; the simulator only
        // ever sees this called by mistake.
        panic!("simulated device reset");
    }

    fn launch_app(&mut self, app_addr: u32) -> ! {
        panic!("simulated jump to application at {app_addr:#010x}");
    }
}

/// A well-formed application image for the simulated device: stack pointer
/// in RAM, reset vector into the application region, patterned payload and
/// a correct CRC footer.
pub fn example_app_image() -> [u8; APP_IMAGE_SIZE] {
    let mut image = [0u8; APP_IMAGE_SIZE];
    for (i, byte) in image.iter_mut().enumerate() {
        *byte = (i as u32).wrapping_mul(31) as u8;
    }
    image[..4].copy_from_slice(&0x2000_4000u32.to_le_bytes());
    let reset_vector = SimFlash::FLASH_APP_START + 0x101;
    image[4..8].copy_from_slice(&reset_vector.to_le_bytes());
    seal_app_image(&mut image);
    image
}

/// Recompute an image's CRC footer after its contents were edited.
pub fn seal_app_image(image: &mut [u8]) {
    let body = image.len() - 4;
    let crc = CRC32.checksum(&image[..body]);
    image[body..].copy_from_slice(&crc.to_le_bytes());
}
