mod common;

use std::process::Command;

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_testbench"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Testbench Simulator"));
    assert!(stdout.contains("test"));
}

#[test]
fn test_cli_load_missing_file() {
    let output = Command::new(env!("CARGO_BIN_EXE_testbench"))
        .arg("-f")
        .arg("non_existent_file.elf")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_requires_firmware() {
    let output = Command::new(env!("CARGO_BIN_EXE_testbench"))
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_streams_uart_to_stdout() {
    let dir = common::scratch_dir("run-ok");
    let fw = common::write_elf(&dir, "ok.elf", &common::print_program(b"OK\n"));

    let output = Command::new(env!("CARGO_BIN_EXE_testbench"))
        .args(["--firmware", fw.to_str().unwrap(), "--max-steps", "1000"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "OK\n");
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("halt"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_runtime_fault_exit_code() {
    let dir = common::scratch_dir("run-fault");
    let fw = common::write_elf(&dir, "fault.elf", &common::faulting_program());

    let output = Command::new(env!("CARGO_BIN_EXE_testbench"))
        .args(["--firmware", fw.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(3));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_uses_board_descriptor() {
    let dir = common::scratch_dir("run-board");
    let fw = common::write_elf(&dir, "ok.elf", &common::print_program(b"hi"));
    let board = dir.join("board.yaml");
    std::fs::write(
        &board,
        r#"
name: "slow-uart"
arch: "rv32i"
ram:
  base: 0x80000000
  size: "16KiB"
uart:
  tx_fifo_depth: 1
  ticks_per_byte: 32
  echo: true
"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_testbench"))
        .args([
            "--firmware",
            fw.to_str().unwrap(),
            "--board",
            board.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "hi");

    let _ = std::fs::remove_dir_all(&dir);
}
