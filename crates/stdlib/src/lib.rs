// Testbench - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Minimal console support for testbench firmware.
//!
//! Everything here writes through a [`CharSink`]. On target that is the
//! memory-mapped [`Uart`]; on the host the simulator and the tests provide
//! their own sinks.

#![cfg_attr(not(test), no_std)]

pub mod decimal;
pub mod sink;
pub mod uart;

pub use decimal::put_int;
pub use sink::{CharSink, StringSink};
pub use uart::Uart;

#[cfg(test)]
pub(crate) mod testing;
