// Testbench - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod memory;
pub mod metrics;
pub mod peripherals;
pub mod sink;

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

pub use testbench_config::StopReason;


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Instruction decoding error at {0:#x}")]
    DecodeError(u64),
}

impl SimulationError {
    pub fn stop_reason(&self) -> StopReason {
        match self {
            SimulationError::MemoryViolation(_) => StopReason::MemoryViolation,
            SimulationError::DecodeError(_) => StopReason::DecodeError,
        }
    }
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self, _reason: StopReason) {}
    fn on_step_start(&self, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _cycles: u32) {}
}

/// What the core wants the machine to do after an instruction retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// `ebreak`/`ecall`, or a jump to itself.
    Halted,
}

/// Trait representing a CPU architecture
pub trait Cpu {
    fn reset(&mut self);
    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<StepOutcome>;
    fn set_pc(&mut self, val: u32);
    fn get_pc(&self) -> u32;
    fn set_sp(&mut self, val: u32);
    fn get_register(&self, id: u8) -> u32;
    fn set_register(&mut self, id: u8, val: u32);
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    /// Advances the device by one simulation tick.
    fn tick(&mut self) {}
    /// Completes any in-flight work, e.g. bytes still queued for output.
    fn flush(&mut self) {}
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;
    fn tick_peripherals(&mut self);
    fn flush_peripherals(&mut self) {}

    fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(addr + 1)? as u16;
        // Little Endian
        Ok(b0 | (b1 << 8))
    }

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        Ok(())
    }
}

/// Result of [`Machine::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub steps: u64,
    pub error: Option<SimulationError>,
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub bus: bus::SystemBus,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    entry_point: u32,
}

impl<C: Cpu + Default> Machine<C> {
    pub fn new() -> Self {
        Self::with_bus(bus::SystemBus::new())
    }

    pub fn with_bus(bus: bus::SystemBus) -> Self {
        Self::with_cpu(C::default(), bus)
    }
}

impl<C: Cpu + Default> Default for Machine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cpu> Machine<C> {
    pub fn with_cpu(cpu: C, bus: bus::SystemBus) -> Self {
        let entry_point = cpu.get_pc();
        Self {
            cpu,
            bus,
            observers: Vec::new(),
            entry_point,
        }
    }

    /// Copies every segment into RAM and points the core at the entry.
    pub fn load_firmware(&mut self, image: &memory::ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            if !self.bus.ram.load_from_segment(segment) {
                tracing::error!(
                    "Segment at {:#x} ({} bytes) is outside of RAM",
                    segment.start_addr,
                    segment.data.len()
                );
                return Err(SimulationError::MemoryViolation(segment.start_addr));
            }
        }

        self.entry_point = image.entry_point as u32;
        self.reset();

        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.set_pc(self.entry_point);
        // Start-up code normally sets its own stack; give it a sane one anyway.
        let stack_top = self.bus.ram.base_addr + self.bus.ram.data.len() as u64;
        self.cpu.set_sp(stack_top as u32);
    }

    pub fn step(&mut self) -> SimResult<StepOutcome> {
        let res = self.cpu.step(&mut self.bus, &self.observers);
        self.bus.tick_peripherals();
        res
    }

    /// Runs until the core halts, faults, or `max_steps` instructions have
    /// retired. Peripherals are flushed before returning.
    pub fn run(&mut self, max_steps: u64) -> RunSummary {
        self.run_until(max_steps, None)
    }

    /// Like [`Machine::run`], additionally stopping once `deadline` passes.
    pub fn run_until(&mut self, max_steps: u64, deadline: Option<Instant>) -> RunSummary {
        for observer in &self.observers {
            observer.on_simulation_start();
        }

        let mut steps = 0;
        let mut error = None;
        let stop_reason = loop {
            if steps >= max_steps {
                break StopReason::MaxSteps;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::WallTime;
            }

            match self.step() {
                Ok(StepOutcome::Continue) => steps += 1,
                Ok(StepOutcome::Halted) => {
                    steps += 1;
                    break StopReason::Halt;
                }
                Err(e) => {
                    tracing::info!("Simulation error at step {}: {}", steps, e);
                    let reason = e.stop_reason();
                    error = Some(e);
                    break reason;
                }
            }
        };

        self.bus.flush_peripherals();
        tracing::debug!(
            "Stopped after {} steps ({}), PC={:#x}",
            steps,
            stop_reason,
            self.cpu.get_pc()
        );

        for observer in &self.observers {
            observer.on_simulation_stop(stop_reason);
        }

        RunSummary {
            stop_reason,
            steps,
            error,
        }
    }
}
