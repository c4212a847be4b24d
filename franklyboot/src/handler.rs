// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Request dispatch and the flash-commit state machine.
//!
//! One request in, one response out. The response starts as an echo of the
//! request (code, packet id, data) and the handler overwrites `result` and,
//! where a command returns something, `data`. Reset and app launch are the
//! only side effects that outlive a request: they are queued so the caller
//! can transmit the response before executing them.

use core::marker::PhantomData;

use heapless::Vec;
use host_protocol::{Msg, RequestType, ResultType, VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH};

use crate::app_check;
use crate::hardware::Hardware;
use crate::page_buffer::{PageBuffer, WRITE_WORD_SIZE};

/// Pages tracked as erased-but-not-yet-committed. Overflowing the tracker is
/// harmless: an untracked page is simply erased again at commit time.
const ERASED_TRACK_CAP: usize = 16;

/// Action to run after the response has left the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SideEffect {
    ResetDevice,
    /// Jump to the application at this address.
    LaunchApp(u32),
}

/// Protocol engine for one device.
///
/// `PAGE_SIZE` must equal `H::FLASH_PAGE_SIZE`; it is a separate parameter
/// only because it sizes the staging buffer.
pub struct Handler<H: Hardware, const PAGE_SIZE: usize> {
    buffer: PageBuffer<PAGE_SIZE>,
    expected_packet_id: u8,
    /// Page pinned as the destination of the in-progress write sequence.
    current_page: Option<u32>,
    /// Pages erased since their last commit.
    erased_pages: Vec<u32, ERASED_TRACK_CAP>,
    side_effect: Option<SideEffect>,
    _hw: PhantomData<H>,
}

impl<H: Hardware, const PAGE_SIZE: usize> Handler<H, PAGE_SIZE> {
    pub fn new() -> Self {
        const {
            assert!(PAGE_SIZE == H::FLASH_PAGE_SIZE as usize);
        }
        let () = H::GEOMETRY_CHECK;

        Self {
            buffer: PageBuffer::new(),
            expected_packet_id: 0,
            current_page: None,
            erased_pages: Vec::new(),
            side_effect: None,
            _hw: PhantomData,
        }
    }

    /// Handle one decoded request and build its response.
    pub fn process_request(&mut self, hw: &mut H, request: &Msg) -> Msg {
        let mut response = *request;
        response.result = ResultType::Ack;

        match request.request {
            RequestType::Ping => {}
            RequestType::ResetDevice => {
                self.abort_transfer();
                self.side_effect = Some(SideEffect::ResetDevice);
            }
            RequestType::StartApp => {
                if app_check::is_app_valid(hw) {
                    self.side_effect = Some(SideEffect::LaunchApp(H::FLASH_APP_START));
                } else {
                    response.result = ResultType::Err;
                }
            }

            RequestType::DevInfoBootloaderVersion => {
                response.data = [VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH, 0];
            }
            RequestType::DevInfoVid => response.set_data_word(hw.vendor_id()),
            RequestType::DevInfoPid => response.set_data_word(hw.product_id()),
            RequestType::DevInfoPrd => response.set_data_word(hw.production_date()),
            RequestType::DevInfoUid => {
                response.set_data_word(hw.unique_id_word(request.data[0] as u32));
            }

            RequestType::FlashInfoStartAddr => response.set_data_word(H::FLASH_START),
            RequestType::FlashInfoPageSize => response.set_data_word(H::FLASH_PAGE_SIZE),
            RequestType::FlashInfoNumPages => response.set_data_word(H::FLASH_NUM_PAGES),

            RequestType::AppInfoPageIdx => response.set_data_word(H::FLASH_APP_FIRST_PAGE),
            RequestType::AppInfoCrcCalc => {
                response.set_data_word(app_check::calculated_crc(hw));
            }
            RequestType::AppInfoCrcStrd => response.set_data_word(app_check::stored_crc(hw)),

            RequestType::PageBufferClear => {
                self.buffer.reset();
                self.expected_packet_id = 0;
            }
            RequestType::PageBufferReadWord => self.page_buffer_read_word(request, &mut response),
            RequestType::PageErase => self.page_erase(hw, request, &mut response),
            RequestType::PageWriteWord => self.page_write_word(request, &mut response),
            RequestType::PageWriteBufferCalcCrc => response.set_data_word(self.buffer.crc()),
            RequestType::PageWriteBufferToFlash => self.page_commit(hw, request, &mut response),

            RequestType::FlashReadWord => self.flash_read_word(hw, request, &mut response),

            RequestType::Unknown(_) => response.result = ResultType::ErrNotSupported,
        }

        response
    }

    /// Side effect queued by the last request, if any. The caller executes
    /// it after transmitting the response.
    pub fn take_side_effect(&mut self) -> Option<SideEffect> {
        self.side_effect.take()
    }

    /// Next `PageWriteWord` packet id the device will accept.
    pub fn expected_packet_id(&self) -> u8 {
        self.expected_packet_id
    }

    fn abort_transfer(&mut self) {
        self.buffer.reset();
        self.expected_packet_id = 0;
        self.current_page = None;
    }

    fn page_erase(&mut self, hw: &mut H, request: &Msg, response: &mut Msg) {
        let page_id = request.data_word();
        if !Self::app_page_in_range(page_id) {
            response.result = ResultType::ErrInvldArg;
            return;
        }
        if !hw.erase_page(page_id) {
            response.result = ResultType::Err;
            return;
        }
        self.note_erased(page_id);
        // The first erase after a commit pins the write destination; later
        // erases may pre-clear pages further ahead.
        if self.current_page.is_none() {
            self.current_page = Some(page_id);
        }
    }

    fn page_write_word(&mut self, request: &Msg, response: &mut Msg) {
        if request.packet_id != self.expected_packet_id {
            // Out-of-sequence packet: the whole page restarts from zero.
            self.buffer.reset();
            self.expected_packet_id = 0;
            self.current_page = None;
            response.result = ResultType::ErrInvldArg;
            return;
        }
        if !self.buffer.append(request.data) {
            response.result = ResultType::ErrPageFull;
            return;
        }
        response.result = if self.buffer.is_full() {
            ResultType::AckPageFull
        } else {
            ResultType::Ack
        };
        self.expected_packet_id = self.expected_packet_id.wrapping_add(1);
    }

    fn page_commit(&mut self, hw: &mut H, request: &Msg, response: &mut Msg) {
        let page_id = request.data_word();
        if !Self::app_page_in_range(page_id) || !self.buffer.is_full() {
            response.result = ResultType::ErrInvldArg;
            return;
        }
        if self.current_page.is_some_and(|pinned| pinned != page_id) {
            response.result = ResultType::ErrInvldArg;
            return;
        }

        // Every commit is preceded by an erase of its page; do it here when
        // the host skipped the explicit PageErase.
        if !self.erased_pages.contains(&page_id) && !hw.erase_page(page_id) {
            response.result = ResultType::Err;
            return;
        }
        // Programming consumes the erase, whatever the outcome below.
        self.forget_erased(page_id);

        let addr = H::page_addr(page_id);
        if !hw.write_page(addr, page_id, self.buffer.bytes()) {
            response.result = ResultType::Err;
            return;
        }
        if hw.crc32(addr, H::FLASH_PAGE_SIZE) != self.buffer.crc() {
            response.result = ResultType::ErrCrc;
            return;
        }

        self.buffer.reset();
        self.expected_packet_id = 0;
        self.current_page = None;
    }

    fn page_buffer_read_word(&self, request: &Msg, response: &mut Msg) {
        let offset = request.data_word() as usize;
        match self.buffer.word_at(offset) {
            Some(word) => response.data = word,
            None => response.result = ResultType::ErrInvldArg,
        }
    }

    fn flash_read_word(&self, hw: &H, request: &Msg, response: &mut Msg) {
        let addr = request.data_word();
        let in_range = addr >= H::FLASH_START && addr <= H::FLASH_END - WRITE_WORD_SIZE as u32;
        if addr % WRITE_WORD_SIZE as u32 != 0 || !in_range {
            response.result = ResultType::ErrInvldArg;
            return;
        }
        response.set_data_word(hw.read_word(addr));
    }

    /// The bootloader's own pages can never be erased or programmed.
    fn app_page_in_range(page_id: u32) -> bool {
        page_id >= H::FLASH_APP_FIRST_PAGE && page_id < H::FLASH_NUM_PAGES
    }

    fn note_erased(&mut self, page_id: u32) {
        if !self.erased_pages.contains(&page_id) {
            // A full tracker just means one redundant erase at commit time.
            let _ = self.erased_pages.push(page_id);
        }
    }

    fn forget_erased(&mut self, page_id: u32) {
        self.erased_pages.retain(|&p| p != page_id);
    }
}

impl<H: Hardware, const PAGE_SIZE: usize> Default for Handler<H, PAGE_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}
