// Testbench - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Prints the `put_int` samples over UART0, then spins.
//!
//! ```text
//! # in crates/firmware
//! cargo build --release
//! # at the workspace root
//! cargo run -p testbench-cli -- test --script crates/firmware/test.yaml
//! ```

#![no_std]
#![no_main]

use panic_halt as _;
use riscv_rt::entry;
use testbench_stdlib::uart::UART0_BASE;
use testbench_stdlib::{put_int, CharSink, StringSink, Uart};

const SAMPLES: [isize; 6] = [0, 42, -7, -120, 2147483647, -2147483648];

#[entry]
fn main() -> ! {
    // SAFETY: UART0 is mapped at this address on every supported board and
    // nothing else drives it.
    let mut uart = unsafe { Uart::new(UART0_BASE) };

    uart.puts(b"testbench: put_int\n\0");
    for n in SAMPLES {
        put_int(&mut uart, n);
        uart.putc(b'\n');
    }

    uart.puts(b"isize::MIN=\0");
    put_int(&mut uart, isize::MIN);
    uart.putc(b'\n');
    uart.puts(b"isize::MAX=\0");
    put_int(&mut uart, isize::MAX);
    uart.putc(b'\n');

    loop {}
}
