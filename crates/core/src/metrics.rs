use crate::{SimulationObserver, StopReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Counts retired instructions and cycles across runs.
#[derive(Debug)]
pub struct PerformanceMetrics {
    instruction_count: AtomicU64,
    cycle_count: AtomicU64,
    start_time: Mutex<Instant>,
    last_stop: Mutex<Option<StopReason>>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            instruction_count: AtomicU64::new(0),
            cycle_count: AtomicU64::new(0),
            start_time: Mutex::new(Instant::now()),
            last_stop: Mutex::new(None),
        }
    }

    pub fn reset(&self) {
        self.instruction_count.store(0, Ordering::SeqCst);
        self.cycle_count.store(0, Ordering::SeqCst);
        if let Ok(mut start) = self.start_time.lock() {
            *start = Instant::now();
        }
    }

    pub fn get_instructions(&self) -> u64 {
        self.instruction_count.load(Ordering::SeqCst)
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.last_stop.lock().ok().and_then(|r| *r)
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = match self.start_time.lock() {
            Ok(start) => start.elapsed().as_secs_f64(),
            Err(_) => return 0.0,
        };
        if elapsed > 0.0 {
            self.get_instructions() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_simulation_start(&self) {
        if let Ok(mut start) = self.start_time.lock() {
            *start = Instant::now();
        }
    }

    fn on_simulation_stop(&self, reason: StopReason) {
        if let Ok(mut last) = self.last_stop.lock() {
            *last = Some(reason);
        }
    }

    fn on_step_start(&self, _pc: u32, _opcode: u32) {
        self.instruction_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_step_end(&self, cycles: u32) {
        self.cycle_count.fetch_add(cycles as u64, Ordering::SeqCst);
    }
}
