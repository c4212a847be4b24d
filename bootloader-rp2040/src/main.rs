// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Frankly bootloader for RP2040 boards, USB CDC transport.
//!
//! Task layout: the USB stack and the CDC reader run as embassy tasks; the
//! reader feeds raw bytes into an SPSC ring that the protocol loop in
//! `main` drains. Responses go out before any reset or application jump.

#![no_std]
#![no_main]

mod consts;
mod hardware;

use defmt::{debug, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::yield_now;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::{Driver, InterruptHandler};
use embassy_time::{Duration, Instant, Timer};
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, State};
use embassy_usb::{Builder, UsbDevice};
use panic_probe as _;
use static_cell::StaticCell;

use franklyboot::{
    is_app_valid, BootArbiter, ByteRing, FrameAssembler, Handler, Hardware, SideEffect,
};
use host_protocol::{Msg, AUTOBOOT_OVERRIDE_KEY};

use crate::hardware::Rp2040Hardware;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
});

type UsbDriver = Driver<'static, USB>;

/// Transport bytes from the USB reader task to the protocol loop.
static RX_RING: ByteRing<256> = ByteRing::new();

static ARBITER: BootArbiter = BootArbiter::new();

/// A partial frame is dropped when its next byte is more than this late.
const INTER_BYTE_TIMEOUT: Duration = Duration::from_micros(500);

/// Window in which a host can claim the device before a valid app starts.
const AUTOBOOT_DELAY: Duration = Duration::from_secs(1);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    // Stay-in-bootloader handshake: the application writes the override key
    // into watchdog scratch and resets. Read-and-clear before anything else.
    let override_key_observed = hardware::take_scratch_key() == AUTOBOOT_OVERRIDE_KEY;

    let mut hw = Rp2040Hardware::new(p.FLASH);
    let app_valid = is_app_valid(&hw);
    ARBITER.init(app_valid, override_key_observed);
    info!(
        "franklyboot rp2040 up: app_valid={} boot_hold={}",
        app_valid, override_key_observed
    );

    // ---- USB CDC device ----
    let driver = Driver::new(p.USB, Irqs);

    let mut config = embassy_usb::Config::new(consts::USB_VID, consts::USB_PID);
    config.manufacturer = Some("FRANCOR");
    config.product = Some("Frankly Bootloader");
    config.serial_number = Some("FRANKLY01");
    config.max_packet_size_0 = 64;

    static CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    static CDC_STATE: StaticCell<State> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESC.init([0; 256]),
        BOS_DESC.init([0; 256]),
        &mut [],
        CONTROL_BUF.init([0; 64]),
    );
    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), 64);
    let usb = builder.build();

    let (mut tx, rx) = class.split();

    spawner.must_spawn(usb_device_task(usb));
    spawner.must_spawn(usb_rx_task(rx));
    spawner.must_spawn(autoboot_timer());

    // ---- Protocol loop ----
    let mut handler = Handler::<Rp2040Hardware, { consts::FLASH_PAGE_SIZE as usize }>::new();
    // The inter-byte timeout is deadline-driven here; the tick counter of
    // the assembler is for polled ports.
    let mut assembler = FrameAssembler::new(u32::MAX);
    let mut deadline = Instant::MAX;

    loop {
        if ARBITER.should_launch() {
            info!("autoboot: starting application");
            hw.launch_app(consts::FLASH_APP_START);
        }

        let Some(byte) = RX_RING.pop() else {
            if assembler.in_progress() && Instant::now() >= deadline {
                warn!("partial frame timed out, restarting at byte 0");
                assembler.reset();
            }
            yield_now().await;
            continue;
        };

        deadline = Instant::now() + INTER_BYTE_TIMEOUT;
        let Some(raw) = assembler.push_byte(byte) else {
            continue;
        };

        let request = Msg::decode(&raw);
        ARBITER.observe_request(request.request);
        let response = handler.process_request(&mut hw, &request);
        debug!("{} -> {}", request, response);

        // The host must observe the response before any side effect takes
        // the link down.
        let _ = tx.write_packet(&response.encode()).await;

        match handler.take_side_effect() {
            Some(SideEffect::ResetDevice) => {
                Timer::after_millis(100).await;
                hw.reset_device();
            }
            Some(SideEffect::LaunchApp(addr)) => {
                info!("starting application at {:#010x}", addr);
                Timer::after_millis(10).await;
                hw.launch_app(addr);
            }
            None => {}
        }
    }
}

#[embassy_executor::task]
async fn usb_device_task(mut usb: UsbDevice<'static, UsbDriver>) {
    usb.run().await;
}

/// Producer side of the byte ring; owns the CDC OUT endpoint.
#[embassy_executor::task]
async fn usb_rx_task(mut rx: Receiver<'static, UsbDriver>) {
    let mut buf = [0u8; 64];
    loop {
        rx.wait_connection().await;
        info!("host connected");
        while let Ok(n) = rx.read_packet(&mut buf).await {
            for &byte in &buf[..n] {
                // Back-pressure: hold the USB packet until a slot frees.
                while !RX_RING.push(byte) {
                    yield_now().await;
                }
            }
        }
        info!("host disconnected");
    }
}

/// One-shot autoboot timer.
#[embassy_executor::task]
async fn autoboot_timer() {
    Timer::after(AUTOBOOT_DELAY).await;
    ARBITER.timer_expired();
}
