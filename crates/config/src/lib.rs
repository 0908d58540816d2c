use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_RAM_BASE: u64 = 0x8000_0000;
pub const DEFAULT_RAM_SIZE: &str = "64KiB";
pub const DEFAULT_UART_BASE: u64 = 0x1001_0000;
pub const DEFAULT_TX_FIFO_DEPTH: usize = 8;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64KiB"
}

fn default_uart_base() -> u64 {
    DEFAULT_UART_BASE
}

fn default_fifo_depth() -> usize {
    DEFAULT_TX_FIFO_DEPTH
}

fn default_ticks_per_byte() -> u32 {
    1
}

fn default_echo() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartConfig {
    #[serde(default = "default_uart_base")]
    pub base_address: u64,
    #[serde(default = "default_fifo_depth")]
    pub tx_fifo_depth: usize,
    /// Simulation ticks needed to shift one byte out of the transmit FIFO.
    #[serde(default = "default_ticks_per_byte")]
    pub ticks_per_byte: u32,
    /// Mirror transmitted bytes to the host's stdout.
    #[serde(default = "default_echo")]
    pub echo: bool,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            base_address: default_uart_base(),
            tx_fifo_depth: DEFAULT_TX_FIFO_DEPTH,
            ticks_per_byte: default_ticks_per_byte(),
            echo: default_echo(),
        }
    }
}

/// Memory map of the simulated testbench board.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoardDescriptor {
    pub name: String,
    pub arch: String, // "rv32i" or "rv32im"
    pub ram: MemoryRange,
    #[serde(default)]
    pub uart: UartConfig,
}

impl Default for BoardDescriptor {
    fn default() -> Self {
        Self {
            name: "testbench".to_string(),
            arch: "rv32im".to_string(),
            ram: MemoryRange {
                base: DEFAULT_RAM_BASE,
                size: DEFAULT_RAM_SIZE.to_string(),
            },
            uart: UartConfig::default(),
        }
    }
}

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open board descriptor at {:?}", path.as_ref()))?;
        let board: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Descriptor")?;
        board.validate()?;
        Ok(board)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.arch.as_str(), "rv32i" | "rv32im") {
            anyhow::bail!(
                "Unsupported arch '{}'. Supported: 'rv32i', 'rv32im'",
                self.arch
            );
        }

        let ram_size = self.ram_size()?;
        if ram_size == 0 {
            anyhow::bail!("RAM size must be greater than zero");
        }

        let ram = self.ram.base..address_end("RAM", self.ram.base, ram_size)?;
        let uart = self.uart.base_address
            ..address_end("UART", self.uart.base_address, UART_REGION_SIZE)?;
        if ram.start < uart.end && uart.start < ram.end {
            anyhow::bail!(
                "UART at {:#x} overlaps RAM {:#x}..{:#x}",
                self.uart.base_address,
                ram.start,
                ram.end
            );
        }

        if self.uart.tx_fifo_depth == 0 {
            anyhow::bail!("UART 'tx_fifo_depth' must be greater than zero");
        }
        if self.uart.ticks_per_byte == 0 {
            anyhow::bail!("UART 'ticks_per_byte' must be greater than zero");
        }

        Ok(())
    }

    pub fn ram_size(&self) -> Result<u64> {
        parse_size(&self.ram.size)
            .with_context(|| format!("Invalid RAM size '{}'", self.ram.size))
    }
}

/// Size of the UART register window on the bus.
pub const UART_REGION_SIZE: u64 = 0x1000;

/// Highest exclusive end address an RV32 core can reach.
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

fn address_end(what: &str, base: u64, size: u64) -> Result<u64> {
    match base.checked_add(size) {
        Some(end) if end <= ADDRESS_SPACE_END => Ok(end),
        _ => anyhow::bail!(
            "{} range {:#x}+{:#x} does not fit in the 32-bit address space",
            what,
            base,
            size
        ),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    pub firmware: String,
    #[serde(default)]
    pub board: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub max_steps: u64,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    WallTime,
    MemoryViolation,
    DecodeError,
    Halt,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StopReason::MaxSteps => "max_steps",
            StopReason::WallTime => "wall_time",
            StopReason::MemoryViolation => "memory_violation",
            StopReason::DecodeError => "decode_error",
            StopReason::Halt => "halt",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

/// Golden output check. Both sides are trimmed before comparing.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartEqualsAssertion {
    pub uart_equals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    UartContains(UartContainsAssertion),
    UartEquals(UartEqualsAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

impl TestAssertion {
    /// Checks the assertion against a finished run.
    pub fn check(&self, uart: &str, stop_reason: StopReason) -> bool {
        match self {
            TestAssertion::UartContains(a) => uart.contains(&a.uart_contains),
            TestAssertion::UartEquals(a) => uart.trim() == a.uart_equals.trim(),
            TestAssertion::ExpectedStopReason(a) => a.expected_stop_reason == stop_reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self = serde_yaml::from_reader(f)
            .context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.inputs.firmware.trim().is_empty() {
            anyhow::bail!("Input 'firmware' path cannot be empty");
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
