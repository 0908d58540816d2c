//! Host-side [`CharSink`] that drives a UART through the simulated bus.

use crate::{Bus, SimResult, SimulationError};
use testbench_stdlib::CharSink;

/// Polls and writes a UART's `txdata` register over a [`Bus`], ticking the
/// peripherals on every poll so the device makes progress while the writer
/// busy-waits.
///
/// The sink contract has no error path, so the first bus fault is latched:
/// from then on the sink reports ready and discards bytes, and
/// [`BusSink::finish`] returns the fault.
pub struct BusSink<'a, B: Bus + ?Sized> {
    bus: &'a mut B,
    txdata: u64,
    polls: u64,
    fault: Option<SimulationError>,
}

impl<'a, B: Bus + ?Sized> BusSink<'a, B> {
    pub fn new(bus: &'a mut B, uart_base: u64) -> Self {
        Self {
            bus,
            txdata: uart_base,
            polls: 0,
            fault: None,
        }
    }

    /// Number of times the ready flag was sampled.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn finish(self) -> SimResult<()> {
        match self.fault {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<B: Bus + ?Sized> CharSink for BusSink<'_, B> {
    fn is_ready(&mut self) -> bool {
        if self.fault.is_some() {
            return true;
        }
        self.polls += 1;
        self.bus.tick_peripherals();
        match self.bus.read_u32(self.txdata) {
            Ok(word) => (word as i32) >= 0,
            Err(e) => {
                tracing::warn!("UART poll failed: {}", e);
                self.fault = Some(e);
                true
            }
        }
    }

    fn transmit(&mut self, byte: u8) {
        if self.fault.is_some() {
            return;
        }
        if let Err(e) = self.bus.write_u32(self.txdata, byte as u32) {
            tracing::warn!("UART write failed: {}", e);
            self.fault = Some(e);
        }
    }
}
