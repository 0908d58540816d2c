use crate::{build_machine, load_board, EXIT_ASSERT_FAIL, EXIT_CONFIG_ERROR, EXIT_PASS};
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use testbench_config::{StopReason, TestAssertion, TestScript};
use tracing::{error, info};

/// Upper bound on `limits.max_steps` accepted from a script.
pub const MAX_ALLOWED_STEPS: u64 = 50_000_000;

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Path to the test script (YAML)
    #[arg(long)]
    pub script: PathBuf,

    /// Directory that receives result.json
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not copy UART output to stdout
    #[arg(long)]
    pub no_uart_stdout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Pass,
    Fail,
}

#[derive(Debug, Serialize)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct ResolvedConfig {
    script: PathBuf,
    firmware: PathBuf,
    board: Option<PathBuf>,
    max_steps: u64,
    wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TestResult {
    status: Status,
    stop_reason: StopReason,
    steps: u64,
    error: Option<String>,
    uart: String,
    firmware_hash: String,
    config: ResolvedConfig,
    assertions: Vec<AssertionResult>,
}

pub fn run(args: &TestArgs) -> u8 {
    let result = match execute(args) {
        Ok(result) => result,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    if let Some(dir) = &args.output_dir {
        if let Err(e) = write_result(dir, &result) {
            error!("{:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    }

    match result.status {
        Status::Pass => {
            info!("PASS ({} after {} steps)", result.stop_reason, result.steps);
            EXIT_PASS
        }
        Status::Fail => {
            error!("FAIL ({} after {} steps)", result.stop_reason, result.steps);
            EXIT_ASSERT_FAIL
        }
    }
}

/// Paths inside a script are relative to the script itself.
fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn execute(args: &TestArgs) -> Result<TestResult> {
    info!("Loading test script: {:?}", args.script);
    let script = TestScript::from_file(&args.script)?;
    if script.limits.max_steps > MAX_ALLOWED_STEPS {
        bail!(
            "Limit 'max_steps' ({}) exceeds the maximum of {}",
            script.limits.max_steps,
            MAX_ALLOWED_STEPS
        );
    }

    let base = args.script.parent().unwrap_or_else(|| Path::new("."));
    let firmware = resolve(base, &script.inputs.firmware);
    let board_path = script.inputs.board.as_deref().map(|b| resolve(base, b));

    let mut board = load_board(board_path.as_deref())?;
    if args.no_uart_stdout {
        board.uart.echo = false;
    }

    let firmware_bytes = std::fs::read(&firmware)
        .with_context(|| format!("Failed to read firmware: {:?}", firmware))?;
    let firmware_hash = format!("{:x}", Sha256::digest(&firmware_bytes));

    let mut machine = build_machine(&board, &firmware)?;

    let deadline = script
        .limits
        .wall_time_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let summary = machine.run_until(script.limits.max_steps, deadline);

    let uart = machine
        .bus
        .uart()
        .map(|u| u.output_lossy())
        .unwrap_or_default();

    let assertions: Vec<AssertionResult> = script
        .assertions
        .iter()
        .map(|assertion| AssertionResult {
            passed: assertion.check(&uart, summary.stop_reason),
            assertion: assertion.clone(),
        })
        .collect();

    for failed in assertions.iter().filter(|a| !a.passed) {
        error!("Assertion failed: {:?}", failed.assertion);
    }

    let expects_stop_reason = script
        .assertions
        .iter()
        .any(|a| matches!(a, TestAssertion::ExpectedStopReason(_)));
    if let Some(e) = &summary.error {
        if !expects_stop_reason {
            error!("Unexpected simulation error: {}", e);
        }
    }

    let passed = assertions.iter().all(|a| a.passed)
        && (expects_stop_reason || summary.error.is_none());

    Ok(TestResult {
        status: if passed { Status::Pass } else { Status::Fail },
        stop_reason: summary.stop_reason,
        steps: summary.steps,
        error: summary.error.map(|e| e.to_string()),
        uart,
        firmware_hash,
        config: ResolvedConfig {
            script: args.script.clone(),
            firmware,
            board: board_path,
            max_steps: script.limits.max_steps,
            wall_time_ms: script.limits.wall_time_ms,
        },
        assertions,
    })
}

fn write_result(dir: &Path, result: &TestResult) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    let path = dir.join("result.json");
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_to_script() {
        let base = Path::new("/work/scripts");
        assert_eq!(resolve(base, "fw.elf"), PathBuf::from("/work/scripts/fw.elf"));
        assert_eq!(resolve(base, "/abs/fw.elf"), PathBuf::from("/abs/fw.elf"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Pass).unwrap(), "\"pass\"");
        assert_eq!(serde_json::to_string(&Status::Fail).unwrap(), "\"fail\"");
    }
}
