// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! RP2040 implementation of the bootloader hardware interface.
//!
//! Flash goes through the embassy flash driver (which serializes against
//! XIP execution); the CRC is computed in software since the RP2040 has no
//! CRC unit. Reads come straight out of the memory-mapped XIP window.

use core::ptr;

use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::pac;
use embassy_rp::peripherals::FLASH;
use franklyboot::{Hardware, CRC32};

use crate::consts;

pub const FLASH_SIZE_BYTES: usize = consts::FLASH_SIZE as usize;

/// Read and clear the watchdog scratch register used for the
/// stay-in-bootloader handshake. Must happen once, before anything else
/// writes scratch state.
pub fn take_scratch_key() -> u32 {
    let value = pac::WATCHDOG.scratch0().read();
    pac::WATCHDOG.scratch0().write_value(0);
    value
}

pub struct Rp2040Hardware {
    flash: Flash<'static, FLASH, Blocking, FLASH_SIZE_BYTES>,
    unique_id: [u8; 8],
}

impl Rp2040Hardware {
    pub fn new(flash: FLASH) -> Self {
        let mut flash = Flash::new_blocking(flash);
        let mut unique_id = [0u8; 8];
        if flash.blocking_unique_id(&mut unique_id).is_err() {
            unique_id = [0; 8];
        }
        Self { flash, unique_id }
    }

    fn ident_word(idx: usize) -> u32 {
        // Volatile: the words sit in flash and are patched by the factory
        // flasher after this binary is built.
        unsafe { ptr::addr_of!(consts::DEVICE_IDENT[idx]).read_volatile() }
    }
}

impl Hardware for Rp2040Hardware {
    const FLASH_START: u32 = consts::FLASH_START;
    const FLASH_APP_FIRST_PAGE: u32 = consts::FLASH_APP_FIRST_PAGE;
    const FLASH_SIZE: u32 = consts::FLASH_SIZE;
    const FLASH_PAGE_SIZE: u32 = consts::FLASH_PAGE_SIZE;

    fn erase_page(&mut self, page_id: u32) -> bool {
        let offset = page_id * consts::FLASH_PAGE_SIZE;
        self.flash
            .blocking_erase(offset, offset + consts::FLASH_PAGE_SIZE)
            .is_ok()
    }

    fn write_page(&mut self, addr: u32, _page_id: u32, data: &[u8]) -> bool {
        self.flash
            .blocking_write(addr - consts::FLASH_START, data)
            .is_ok()
    }

    fn read_byte(&self, addr: u32) -> u8 {
        debug_assert!((consts::FLASH_START..Self::FLASH_END).contains(&addr));
        unsafe { (addr as *const u8).read_volatile() }
    }

    fn crc32(&self, addr: u32, num_bytes: u32) -> u32 {
        debug_assert!(num_bytes % 4 == 0);
        debug_assert!(addr + num_bytes <= Self::FLASH_END);
        let bytes = unsafe { core::slice::from_raw_parts(addr as *const u8, num_bytes as usize) };
        CRC32.checksum(bytes)
    }

    fn unique_id_word(&self, idx: u32) -> u32 {
        // 64-bit flash UID: words 0 and 1, the third protocol word reads 0.
        match idx {
            0 | 1 => {
                let base = idx as usize * 4;
                u32::from_le_bytes([
                    self.unique_id[base],
                    self.unique_id[base + 1],
                    self.unique_id[base + 2],
                    self.unique_id[base + 3],
                ])
            }
            _ => 0,
        }
    }

    fn vendor_id(&self) -> u32 {
        Self::ident_word(0)
    }

    fn product_id(&self) -> u32 {
        Self::ident_word(1)
    }

    fn production_date(&self) -> u32 {
        Self::ident_word(2)
    }

    fn reset_device(&mut self) -> ! {
        // Give the transport a moment to drain the response.
        cortex_m::asm::delay(1_000_000);
        pac::WATCHDOG.ctrl().write(|w| w.set_trigger(true));
        loop {
            cortex_m::asm::nop();
        }
    }

    fn launch_app(&mut self, app_addr: u32) -> ! {
        let stack_pointer = self.read_word(app_addr);
        let reset_vector = self.read_word(app_addr + 4);

        cortex_m::interrupt::disable();

        unsafe {
            // SysTick off and pending state cleared.
            let syst = &*cortex_m::peripheral::SYST::PTR;
            syst.csr.write(0);
            syst.rvr.write(0);

            // Mask and clear every peripheral interrupt line.
            let nvic = &*cortex_m::peripheral::NVIC::PTR;
            nvic.icer[0].write(0xFFFF_FFFF);
            nvic.icpr[0].write(0xFFFF_FFFF);

            let scb = &*cortex_m::peripheral::SCB::PTR;
            scb.icsr.write((1 << 27) | (1 << 25)); // PENDSVCLR | PENDSTCLR

            // The XIP cache still holds the pre-programming view of any
            // page written this session; flush before executing from it.
            pac::XIP_CTRL.flush().write(|w| w.set_flush(true));
            while !pac::XIP_CTRL.stat().read().flush_ready() {}

            scb.vtor.write(app_addr);

            // Scrub RAM up to 4 KiB below the application's initial stack
            // so bootloader leftovers cannot alias the app's .data/.bss.
            // The loop runs entirely from registers: it wipes this stack
            // too, and nothing may touch memory until the jump.
            core::arch::asm!(
                "2:",
                "cmp {ram}, {ram_end}",
                "bhs 3f",
                "stm {ram}!, {{{zero}}}",
                "b 2b",
                "3:",
                "msr MSP, {sp}",
                "cpsie i",
                "bx {rv}",
                // stm writeback clobbers {ram}; fine, this never returns.
                ram = in(reg) consts::RAM_BASE,
                ram_end = in(reg) stack_pointer.saturating_sub(0x1000),
                zero = in(reg) 0u32,
                sp = in(reg) stack_pointer,
                rv = in(reg) reset_vector,
                options(noreturn),
            );
        }
    }
}
