use crate::CharSink;

/// Base address of UART0 on the testbench board.
pub const UART0_BASE: usize = 0x1001_0000;

/// Word offset of the transmit FIFO register.
pub const UART_REG_TXFIFO: usize = 0;

/// Handle to a memory-mapped SiFive-style UART.
///
/// Reading the TXFIFO register yields a negative value while the FIFO is
/// full (bit 31 set). Writing it queues the low byte for transmission.
#[derive(Debug)]
pub struct Uart {
    regs: *mut i32,
}

impl Uart {
    /// Creates a handle for the UART whose register block starts at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a UART register block that is valid for
    /// volatile 32-bit reads and writes for as long as the handle is used,
    /// and no other handle may drive the same UART concurrently.
    pub const unsafe fn new(base: usize) -> Self {
        Self {
            regs: base as *mut i32,
        }
    }

    /// Address of the register block this handle drives.
    pub fn base(&self) -> usize {
        self.regs as usize
    }

    fn txfifo(&self) -> *mut i32 {
        // SAFETY: the offset stays inside the register block promised in `new`.
        unsafe { self.regs.add(UART_REG_TXFIFO) }
    }
}

impl CharSink for Uart {
    fn is_ready(&mut self) -> bool {
        // SAFETY: see `Uart::new`.
        unsafe { self.txfifo().read_volatile() >= 0 }
    }

    fn transmit(&mut self, byte: u8) {
        // SAFETY: see `Uart::new`.
        unsafe { self.txfifo().write_volatile(byte as i32) }
    }
}
