// SPDX-FileCopyrightText: 2025 FRANCOR e.V. <info@francor.de>
// SPDX-License-Identifier: BSD-3-Clause

//! Puts `memory.x` where the linker can find it and wires up the linker
//! scripts. The bootloader links against the first 128 KiB of flash only;
//! everything above belongs to the application image.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Flash reserved for the bootloader, in bytes. Must stay in sync with
/// `FLASH_APP_FIRST_PAGE` in `src/consts.rs` (32 pages of 4 KiB).
const BOOTLOADER_REGION: u32 = 128 * 1024;

fn main() {
    let memory_x = format!(
        r##"
        MEMORY
        {{
            BOOT2 : ORIGIN = 0x10000000, LENGTH = 0x100
            FLASH : ORIGIN = 0x10000100, LENGTH = {} - 0x100
            RAM   : ORIGIN = 0x20000000, LENGTH = 264K
        }}

        SECTIONS
        {{
            /* Device identification words, programmed by the factory
               flasher; all ones until then. */
            .dev_ident : {{
                KEEP(*(.dev_ident));
                . = ALIGN(4);
            }} > FLASH
        }} INSERT AFTER .rodata;
        "##,
        BOOTLOADER_REGION
    );

    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(memory_x.as_bytes())
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=build.rs");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
