use crate::memory::LinearMemory;
use crate::peripherals::uart::Uart;
use crate::{Peripheral, SimResult, SimulationError};
use anyhow::Result;
use testbench_config::{BoardDescriptor, UartConfig, DEFAULT_RAM_BASE, UART_REGION_SIZE};

pub const UART0: &str = "uart0";

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn offset_of(&self, addr: u64) -> Option<u64> {
        let offset = addr.checked_sub(self.base)?;
        (offset < self.size).then_some(offset)
    }
}

#[derive(Debug)]
pub struct SystemBus {
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// Default testbench board: 64 KiB of RAM at 0x8000_0000 and UART0 at
    /// 0x1001_0000.
    pub fn new() -> Self {
        let uart = UartConfig::default();
        let mut bus = Self {
            ram: LinearMemory::new(64 * 1024, DEFAULT_RAM_BASE),
            peripherals: Vec::new(),
        };
        bus.map(UART0, uart.base_address, UART_REGION_SIZE, Box::new(Uart::new(&uart)));
        bus
    }

    pub fn from_board(board: &BoardDescriptor) -> Result<Self> {
        board.validate()?;
        let ram_size = board.ram_size()?;

        let mut bus = Self {
            ram: LinearMemory::new(ram_size as usize, board.ram.base),
            peripherals: Vec::new(),
        };
        bus.map(
            UART0,
            board.uart.base_address,
            UART_REGION_SIZE,
            Box::new(Uart::new(&board.uart)),
        );

        tracing::debug!(
            "Board '{}': RAM {:#x}+{:#x}, UART0 at {:#x}",
            board.name,
            board.ram.base,
            ram_size,
            board.uart.base_address
        );
        Ok(bus)
    }

    pub fn map(&mut self, name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) {
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.peripheral(UART0)?.dev.as_any()?.downcast_ref::<Uart>()
    }

    pub fn uart_mut(&mut self) -> Option<&mut Uart> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == UART0)?
            .dev
            .as_any_mut()?
            .downcast_mut::<Uart>()
    }

    fn find_peripheral(&self, addr: u64) -> Option<(usize, u64)> {
        self.peripherals
            .iter()
            .enumerate()
            .find_map(|(i, p)| p.offset_of(addr).map(|offset| (i, offset)))
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        if let Some(byte) = self.ram.read_u8(addr) {
            return Ok(byte);
        }
        if let Some((idx, offset)) = self.find_peripheral(addr) {
            return self.peripherals[idx].dev.read(offset);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }
        if let Some((idx, offset)) = self.find_peripheral(addr) {
            return self.peripherals[idx].dev.write(offset, value);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    fn tick_peripherals(&mut self) {
        for p in &mut self.peripherals {
            p.dev.tick();
        }
    }

    fn flush_peripherals(&mut self) {
        for p in &mut self.peripherals {
            p.dev.flush();
        }
    }
}
