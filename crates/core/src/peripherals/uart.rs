use crate::SimResult;
use bitflags::bitflags;
use std::any::Any;
use std::collections::VecDeque;
use std::io::{self, Write};
use testbench_config::UartConfig;

pub const REG_TXDATA: u64 = 0x00;
pub const REG_RXDATA: u64 = 0x04;
pub const REG_TXCTRL: u64 = 0x08;
pub const REG_RXCTRL: u64 = 0x0C;
pub const REG_IE: u64 = 0x10;
pub const REG_IP: u64 = 0x14;
pub const REG_DIV: u64 = 0x18;

/// Bit 31 of `txdata` (FIFO full) and `rxdata` (FIFO empty).
const FLAG_BIT: u32 = 1 << 31;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Watermarks: u32 {
        const TXWM = 1 << 0;
        const RXWM = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxCtrl: u32 {
        const TXEN = 1 << 0;
        const NSTOP = 1 << 1;
        const TXCNT = 0b111 << 16;
    }
}

/// SiFive-style UART with a bounded transmit FIFO.
///
/// Bytes written to `txdata` are queued and shifted out one per
/// `ticks_per_byte` ticks into an in-memory capture buffer. While the queue is
/// full, reads of `txdata` have bit 31 set and further writes are dropped,
/// as on the real device. The receive side is never fed.
#[derive(Debug)]
pub struct Uart {
    tx_fifo: VecDeque<u8>,
    depth: usize,
    ticks_per_byte: u32,
    ticks: u32,
    echo: bool,
    output: Vec<u8>,
    dropped: usize,
    txctrl: TxCtrl,
    rxctrl: u32,
    ie: Watermarks,
    div: u32,
}

impl Default for Uart {
    fn default() -> Self {
        Self::new(&UartConfig::default())
    }
}

impl Uart {
    pub fn new(config: &UartConfig) -> Self {
        Self {
            tx_fifo: VecDeque::with_capacity(config.tx_fifo_depth),
            depth: config.tx_fifo_depth.max(1),
            ticks_per_byte: config.ticks_per_byte.max(1),
            ticks: 0,
            echo: config.echo,
            output: Vec::new(),
            dropped: 0,
            txctrl: TxCtrl::empty(),
            rxctrl: 0,
            ie: Watermarks::empty(),
            div: 0,
        }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn is_tx_full(&self) -> bool {
        self.tx_fifo.len() >= self.depth
    }

    /// Bytes queued but not yet transmitted.
    pub fn tx_pending(&self) -> usize {
        self.tx_fifo.len()
    }

    /// Bytes written while the FIFO was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Everything transmitted so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    fn pending_interrupts(&self) -> Watermarks {
        let txcnt = ((self.txctrl & TxCtrl::TXCNT).bits() >> 16) as usize;
        let mut ip = Watermarks::empty();
        if self.tx_fifo.len() < txcnt {
            ip |= Watermarks::TXWM;
        }
        ip
    }

    fn shift_out(&mut self) {
        if let Some(byte) = self.tx_fifo.pop_front() {
            if self.echo {
                let mut stdout = io::stdout();
                let _ = stdout.write_all(&[byte]);
                let _ = stdout.flush();
            }
            self.output.push(byte);
        }
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            REG_TXDATA => {
                if self.is_tx_full() {
                    FLAG_BIT
                } else {
                    0
                }
            }
            REG_RXDATA => FLAG_BIT,
            REG_TXCTRL => self.txctrl.bits(),
            REG_RXCTRL => self.rxctrl,
            REG_IE => self.ie.bits(),
            REG_IP => self.pending_interrupts().bits(),
            REG_DIV => self.div,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            REG_TXCTRL => self.txctrl = TxCtrl::from_bits_truncate(value),
            REG_RXCTRL => self.rxctrl = value & 0x0007_0001,
            REG_IE => self.ie = Watermarks::from_bits_truncate(value),
            REG_DIV => self.div = value & 0xFFFF,
            _ => {}
        }
    }

    fn push_tx(&mut self, byte: u8) {
        if self.is_tx_full() {
            self.dropped += 1;
            tracing::warn!("UART TX FIFO full, dropping {:#04x}", byte);
            return;
        }
        self.tx_fifo.push_back(byte);
    }
}

impl crate::Peripheral for Uart {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        let reg_val = self.read_reg(reg_offset);
        Ok(((reg_val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        // A word store arrives as four byte writes; only the low byte of
        // txdata carries data.
        if offset == REG_TXDATA {
            self.push_tx(value);
            return Ok(());
        }
        let reg_offset = offset & !3;
        if reg_offset == REG_TXDATA {
            return Ok(());
        }

        let byte_offset = (offset % 4) as u32;
        let mask = 0xFF << (byte_offset * 8);
        let mut reg_val = self.read_reg(reg_offset);
        reg_val &= !mask;
        reg_val |= (value as u32) << (byte_offset * 8);
        self.write_reg(reg_offset, reg_val);
        Ok(())
    }

    fn tick(&mut self) {
        if self.tx_fifo.is_empty() {
            self.ticks = 0;
            return;
        }
        self.ticks += 1;
        if self.ticks >= self.ticks_per_byte {
            self.ticks = 0;
            self.shift_out();
        }
    }

    fn flush(&mut self) {
        while !self.tx_fifo.is_empty() {
            self.shift_out();
        }
        self.ticks = 0;
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
