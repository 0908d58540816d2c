#![allow(dead_code)]

use object::elf;
use object::write::elf::{FileHeader, ProgramHeader, Writer};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub const RAM: u64 = 0x8000_0000;

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir()
        .join("testbench-tests")
        .join(format!("{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    dir
}

fn lui(rd: u32, imm20: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | 0x37
}

fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    ((imm as u32 & 0xFFF) << 20) | (rs1 << 15) | (rd << 7) | 0x13
}

fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
    ((imm as u32 & 0xFFF) << 20) | (rs1 << 15) | (0b010 << 12) | (rd << 7) | 0x03
}

fn sw(rs2: u32, rs1: u32, imm: i32) -> u32 {
    let imm = imm as u32 & 0xFFF;
    ((imm >> 5) << 25) | (rs2 << 20) | (rs1 << 15) | (0b010 << 12) | ((imm & 0x1F) << 7) | 0x23
}

/// `blt rs1, x0, -4`
fn blt_back(rs1: u32) -> u32 {
    0xFE00_4EE3 | (rs1 << 15)
}

const J_SELF: u32 = 0x0000_006F;

/// Busy-waits on UART0 before each byte, then spins on `j .`.
pub fn print_program(text: &[u8]) -> Vec<u32> {
    let mut program = vec![lui(10, 0x10010)];
    for &byte in text {
        program.push(lw(5, 10, 0));
        program.push(blt_back(5));
        program.push(addi(6, 0, byte as i32));
        program.push(sw(6, 10, 0));
    }
    program.push(J_SELF);
    program
}

/// `lw x5, 0(x0)`: faults on the unmapped zero page.
pub fn faulting_program() -> Vec<u32> {
    vec![lw(5, 0, 0)]
}

/// Single loadable segment at the start of RAM.
pub fn riscv_elf(program: &[u32]) -> Vec<u8> {
    let text: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();

    let mut buffer = vec![];
    let mut writer = Writer::new(object::Endianness::Little, false, &mut buffer);
    writer.reserve_file_header();
    writer.reserve_program_headers(1);
    let offset = writer.reserve(text.len(), 16);

    writer
        .write_file_header(&FileHeader {
            os_abi: elf::ELFOSABI_NONE,
            abi_version: 0,
            e_type: elf::ET_EXEC,
            e_machine: elf::EM_RISCV,
            e_entry: RAM,
            e_flags: 0,
        })
        .unwrap();
    writer.write_program_header(&ProgramHeader {
        p_type: elf::PT_LOAD,
        p_flags: elf::PF_R | elf::PF_X,
        p_offset: offset as u64,
        p_vaddr: RAM,
        p_paddr: RAM,
        p_filesz: text.len() as u64,
        p_memsz: text.len() as u64,
        p_align: 16,
    });
    writer.write_align(16);
    writer.write(&text);
    assert_eq!(writer.reserved_len(), writer.len());
    buffer
}

pub fn write_elf(dir: &PathBuf, name: &str, program: &[u32]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, riscv_elf(program)).expect("Failed to write ELF");
    path
}
