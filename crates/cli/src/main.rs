// Testbench - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use testbench_config::BoardDescriptor;
use testbench_core::bus::SystemBus;
use testbench_core::cpu::RiscV;
use testbench_core::metrics::PerformanceMetrics;
use testbench_core::{Cpu, Machine};
use tracing::{error, info};

mod test_mode;

pub(crate) const EXIT_PASS: u8 = 0;
pub(crate) const EXIT_ASSERT_FAIL: u8 = 1;
pub(crate) const EXIT_CONFIG_ERROR: u8 = 2;
pub(crate) const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Testbench Simulator: runs RISC-V firmware against a simulated UART",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the firmware ELF file
    #[arg(short, long)]
    firmware: Option<PathBuf>,

    /// Path to the board descriptor (YAML)
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Enable instruction-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    /// Maximum number of steps to execute
    #[arg(long, default_value = "20000")]
    max_steps: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a test script and evaluate its assertions
    Test(test_mode::TestArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the UART stream.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let code = match &cli.command {
        Some(Command::Test(args)) => test_mode::run(args),
        None => run_firmware(&cli),
    };
    ExitCode::from(code)
}

fn run_firmware(cli: &Cli) -> u8 {
    let Some(firmware) = cli.firmware.as_deref() else {
        error!("No firmware given: pass --firmware, or use the `test` subcommand");
        return EXIT_CONFIG_ERROR;
    };

    info!("Starting Testbench Simulator");

    let machine = load_board(cli.board.as_deref()).and_then(|board| build_machine(&board, firmware));
    let mut machine = match machine {
        Ok(machine) => machine,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.observers.push(metrics.clone());

    info!(
        "Initial PC: {:#x}, SP: {:#x}",
        machine.cpu.get_pc(),
        machine.cpu.get_register(2)
    );
    info!("Running for up to {} steps...", cli.max_steps);
    let summary = machine.run(cli.max_steps);

    info!(
        "Stopped: {} after {} steps, PC={:#x}",
        summary.stop_reason,
        summary.steps,
        machine.cpu.get_pc()
    );
    info!("Throughput: {:.0} instructions/s", metrics.get_ips());

    match summary.error {
        Some(e) => {
            error!("Simulation error: {}", e);
            EXIT_RUNTIME_ERROR
        }
        None => EXIT_PASS,
    }
}

pub(crate) fn load_board(path: Option<&Path>) -> Result<BoardDescriptor> {
    match path {
        Some(path) => {
            info!("Loading board descriptor: {:?}", path);
            BoardDescriptor::from_file(path)
        }
        None => {
            info!("Using default board");
            Ok(BoardDescriptor::default())
        }
    }
}

pub(crate) fn build_machine(board: &BoardDescriptor, firmware: &Path) -> Result<Machine<RiscV>> {
    let bus = SystemBus::from_board(board)?;

    info!("Loading firmware: {:?}", firmware);
    let program = testbench_loader::load_elf(firmware)?;
    info!(
        "Entry Point: {:#x}, {} bytes in {} segment(s)",
        program.entry_point,
        program.total_size(),
        program.segments.len()
    );

    let mut machine = Machine::with_cpu(RiscV::for_arch(&board.arch), bus);
    machine
        .load_firmware(&program)
        .context("Failed to load firmware into memory")?;
    Ok(machine)
}
