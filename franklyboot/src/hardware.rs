// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Hardware capability trait implemented once per board.
//!
//! Flash geometry is compile-time state: it sizes the page buffer and feeds
//! every bounds check, so it lives in associated constants rather than in
//! runtime configuration.

/// Everything the protocol engine needs from the platform.
///
/// The implementor owns the non-volatile region; all mutation of flash goes
/// through this trait.
pub trait Hardware {
    /// First byte address of flash in the MCU address space.
    const FLASH_START: u32;
    /// Index of the first page that belongs to the application.
    const FLASH_APP_FIRST_PAGE: u32;
    /// Total flash size in bytes.
    const FLASH_SIZE: u32;
    /// Erase-page size in bytes.
    const FLASH_PAGE_SIZE: u32;

    const FLASH_NUM_PAGES: u32 = Self::FLASH_SIZE / Self::FLASH_PAGE_SIZE;
    const FLASH_END: u32 = Self::FLASH_START + Self::FLASH_SIZE;
    const FLASH_APP_START: u32 =
        Self::FLASH_START + Self::FLASH_APP_FIRST_PAGE * Self::FLASH_PAGE_SIZE;
    const FLASH_APP_SIZE: u32 = Self::FLASH_SIZE - Self::FLASH_APP_FIRST_PAGE * Self::FLASH_PAGE_SIZE;

    /// Forces a compile-time error on impossible geometry. Evaluated by
    /// [`Handler::new`](crate::handler::Handler::new).
    const GEOMETRY_CHECK: () = assert!(
        Self::FLASH_SIZE % Self::FLASH_PAGE_SIZE == 0
            && Self::FLASH_APP_FIRST_PAGE * Self::FLASH_PAGE_SIZE < Self::FLASH_SIZE
    );

    /// Base address of a page.
    fn page_addr(page_id: u32) -> u32 {
        Self::FLASH_START + page_id * Self::FLASH_PAGE_SIZE
    }

    /// Erase one flash page. The page reads `0xFF` everywhere afterwards.
    /// Returns `false` on hardware error.
    fn erase_page(&mut self, page_id: u32) -> bool;

    /// Program `data` starting at `addr` into page `page_id`.
    ///
    /// `data.len()` is a positive multiple of the program granule, `addr` is
    /// granule-aligned, and the target page has been erased by the caller.
    /// Returns `false` on hardware error.
    fn write_page(&mut self, addr: u32, page_id: u32, data: &[u8]) -> bool;

    /// Read one byte at a physical flash address.
    fn read_byte(&self, addr: u32) -> u8;

    /// Little-endian word read through [`Hardware::read_byte`].
    fn read_word(&self, addr: u32) -> u32 {
        u32::from_le_bytes([
            self.read_byte(addr),
            self.read_byte(addr + 1),
            self.read_byte(addr + 2),
            self.read_byte(addr + 3),
        ])
    }

    /// CRC-32/ISO-HDLC over `num_bytes` bytes of flash starting at `addr`.
    ///
    /// `num_bytes` must be a multiple of 4; word-stepped hardware CRC units
    /// are then exact. Cannot fail.
    fn crc32(&self, addr: u32, num_bytes: u32) -> u32;

    /// One word of the factory unique ID, `idx` in `0..3`. Out-of-range
    /// indices read 0.
    fn unique_id_word(&self, idx: u32) -> u32;

    /// Vendor ID from the device identification words (`0xFFFF_FFFF` when
    /// the factory flasher has not programmed them).
    fn vendor_id(&self) -> u32;
    fn product_id(&self) -> u32;
    fn production_date(&self) -> u32;

    /// Full MCU reset.
    fn reset_device(&mut self) -> !;

    /// Hand control to the application at `app_addr`: disable interrupts,
    /// clear pending IRQs, set the vector table base, load the stack pointer
    /// from `*app_addr` and jump to `*(app_addr + 4)`.
    fn launch_app(&mut self, app_addr: u32) -> !;
}
