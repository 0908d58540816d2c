// Testbench - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::csr::{self, CsrFile};
use crate::decoder::{decode_rv32, Instruction};
use crate::{Bus, Cpu, SimResult, SimulationError, SimulationObserver, StepOutcome};
use std::sync::Arc;

/// Reset vector of the testbench board (start of RAM).
pub const RESET_VECTOR: u32 = 0x8000_0000;

#[derive(Debug)]
pub struct RiscV {
    pub x: [u32; 32], // x0..x31. x0 is hardwired to 0 in logic.
    pub pc: u32,
    pub csrs: CsrFile,
    m_extension: bool,
}

impl Default for RiscV {
    fn default() -> Self {
        Self::new()
    }
}

impl RiscV {
    /// RV32IM core.
    pub fn new() -> Self {
        Self::with_m_extension(true)
    }

    pub fn with_m_extension(m_extension: bool) -> Self {
        Self {
            x: [0; 32],
            pc: RESET_VECTOR,
            csrs: CsrFile::new(m_extension),
            m_extension,
        }
    }

    /// Builds the core named by a board's `arch` string.
    pub fn for_arch(arch: &str) -> Self {
        Self::with_m_extension(arch != "rv32i")
    }

    pub fn read_reg(&self, n: u8) -> u32 {
        if n == 0 {
            0
        } else {
            self.x[n as usize]
        }
    }

    pub fn write_reg(&mut self, n: u8, val: u32) {
        if n != 0 {
            self.x[n as usize] = val;
        }
    }

    /// Read-modify-write shared by all six CSR instructions. `write` is
    /// `None` when the instruction must not write the CSR.
    fn csr_op(&mut self, rd: u8, csr: u16, write: Option<u32>, op: fn(u32, u32) -> u32) {
        let old = self.csrs.read(csr);
        if let Some(operand) = write {
            self.csrs.write(csr, op(old, operand));
        }
        self.write_reg(rd, old);
    }

    fn require_m(&self) -> SimResult<()> {
        if self.m_extension {
            Ok(())
        } else {
            tracing::error!("M-extension instruction at {:#x} on an rv32i core", self.pc);
            Err(SimulationError::DecodeError(self.pc as u64))
        }
    }
}

impl Cpu for RiscV {
    fn reset(&mut self) {
        self.x = [0; 32];
        self.pc = RESET_VECTOR;
        self.csrs.clear();
    }

    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<StepOutcome> {
        let opcode = bus.read_u32(self.pc as u64)?;

        for observer in observers {
            observer.on_step_start(self.pc, opcode);
        }

        let instruction = decode_rv32(opcode);
        tracing::debug!("PC={:#x}, Op={:#010x}, Instr={:?}", self.pc, opcode, instruction);

        if instruction.is_m_extension() {
            self.require_m()?;
        }

        let mut next_pc = self.pc.wrapping_add(4);
        let mut halted = false;

        match instruction {
            Instruction::Lui { rd, imm } => {
                self.write_reg(rd, imm);
            }
            Instruction::Auipc { rd, imm } => {
                let val = self.pc.wrapping_add(imm);
                self.write_reg(rd, val);
            }
            Instruction::Jal { rd, imm } => {
                let target = self.pc.wrapping_add(imm as u32);
                self.write_reg(rd, self.pc.wrapping_add(4));
                next_pc = target;
            }
            Instruction::Jalr { rd, rs1, imm } => {
                let base = self.read_reg(rs1);
                let target = base.wrapping_add(imm as u32) & !1;
                self.write_reg(rd, self.pc.wrapping_add(4));
                next_pc = target;
            }
            Instruction::Beq { rs1, rs2, imm } => {
                if self.read_reg(rs1) == self.read_reg(rs2) {
                    next_pc = self.pc.wrapping_add(imm as u32);
                }
            }
            Instruction::Bne { rs1, rs2, imm } => {
                if self.read_reg(rs1) != self.read_reg(rs2) {
                    next_pc = self.pc.wrapping_add(imm as u32);
                }
            }
            Instruction::Blt { rs1, rs2, imm } => {
                if (self.read_reg(rs1) as i32) < (self.read_reg(rs2) as i32) {
                    next_pc = self.pc.wrapping_add(imm as u32);
                }
            }
            Instruction::Bge { rs1, rs2, imm } => {
                if (self.read_reg(rs1) as i32) >= (self.read_reg(rs2) as i32) {
                    next_pc = self.pc.wrapping_add(imm as u32);
                }
            }
            Instruction::Bltu { rs1, rs2, imm } => {
                if self.read_reg(rs1) < self.read_reg(rs2) {
                    next_pc = self.pc.wrapping_add(imm as u32);
                }
            }
            Instruction::Bgeu { rs1, rs2, imm } => {
                if self.read_reg(rs1) >= self.read_reg(rs2) {
                    next_pc = self.pc.wrapping_add(imm as u32);
                }
            }
            Instruction::Lb { rd, rs1, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = bus.read_u8(addr as u64)? as i8;
                self.write_reg(rd, val as i32 as u32);
            }
            Instruction::Lh { rd, rs1, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = bus.read_u16(addr as u64)? as i16;
                self.write_reg(rd, val as i32 as u32);
            }
            Instruction::Lw { rd, rs1, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = bus.read_u32(addr as u64)?;
                self.write_reg(rd, val);
            }
            Instruction::Lbu { rd, rs1, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = bus.read_u8(addr as u64)?;
                self.write_reg(rd, val as u32);
            }
            Instruction::Lhu { rd, rs1, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = bus.read_u16(addr as u64)?;
                self.write_reg(rd, val as u32);
            }
            Instruction::Sb { rs1, rs2, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = self.read_reg(rs2) as u8;
                bus.write_u8(addr as u64, val)?;
            }
            Instruction::Sh { rs1, rs2, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = self.read_reg(rs2) as u16;
                bus.write_u16(addr as u64, val)?;
            }
            Instruction::Sw { rs1, rs2, imm } => {
                let addr = self.read_reg(rs1).wrapping_add(imm as u32);
                let val = self.read_reg(rs2);
                bus.write_u32(addr as u64, val)?;
            }
            Instruction::Addi { rd, rs1, imm } => {
                let res = self.read_reg(rs1).wrapping_add(imm as u32);
                self.write_reg(rd, res);
            }
            Instruction::Slti { rd, rs1, imm } => {
                let val = if (self.read_reg(rs1) as i32) < imm { 1 } else { 0 };
                self.write_reg(rd, val);
            }
            Instruction::Sltiu { rd, rs1, imm } => {
                let val = if self.read_reg(rs1) < (imm as u32) { 1 } else { 0 };
                self.write_reg(rd, val);
            }
            Instruction::Xori { rd, rs1, imm } => {
                let res = self.read_reg(rs1) ^ (imm as u32);
                self.write_reg(rd, res);
            }
            Instruction::Ori { rd, rs1, imm } => {
                let res = self.read_reg(rs1) | (imm as u32);
                self.write_reg(rd, res);
            }
            Instruction::Andi { rd, rs1, imm } => {
                let res = self.read_reg(rs1) & (imm as u32);
                self.write_reg(rd, res);
            }
            Instruction::Slli { rd, rs1, shamt } => {
                let res = self.read_reg(rs1) << shamt;
                self.write_reg(rd, res);
            }
            Instruction::Srli { rd, rs1, shamt } => {
                let res = self.read_reg(rs1) >> shamt;
                self.write_reg(rd, res);
            }
            Instruction::Srai { rd, rs1, shamt } => {
                let res = (self.read_reg(rs1) as i32) >> shamt;
                self.write_reg(rd, res as u32);
            }
            Instruction::Add { rd, rs1, rs2 } => {
                let res = self.read_reg(rs1).wrapping_add(self.read_reg(rs2));
                self.write_reg(rd, res);
            }
            Instruction::Sub { rd, rs1, rs2 } => {
                let res = self.read_reg(rs1).wrapping_sub(self.read_reg(rs2));
                self.write_reg(rd, res);
            }
            Instruction::Sll { rd, rs1, rs2 } => {
                let shamt = self.read_reg(rs2) & 0x1F;
                let res = self.read_reg(rs1) << shamt;
                self.write_reg(rd, res);
            }
            Instruction::Slt { rd, rs1, rs2 } => {
                let val = if (self.read_reg(rs1) as i32) < (self.read_reg(rs2) as i32) { 1 } else { 0 };
                self.write_reg(rd, val);
            }
            Instruction::Sltu { rd, rs1, rs2 } => {
                let val = if self.read_reg(rs1) < self.read_reg(rs2) { 1 } else { 0 };
                self.write_reg(rd, val);
            }
            Instruction::Xor { rd, rs1, rs2 } => {
                let res = self.read_reg(rs1) ^ self.read_reg(rs2);
                self.write_reg(rd, res);
            }
            Instruction::Srl { rd, rs1, rs2 } => {
                let shamt = self.read_reg(rs2) & 0x1F;
                let res = self.read_reg(rs1) >> shamt;
                self.write_reg(rd, res);
            }
            Instruction::Sra { rd, rs1, rs2 } => {
                let shamt = self.read_reg(rs2) & 0x1F;
                let res = (self.read_reg(rs1) as i32) >> shamt;
                self.write_reg(rd, res as u32);
            }
            Instruction::Or { rd, rs1, rs2 } => {
                let res = self.read_reg(rs1) | self.read_reg(rs2);
                self.write_reg(rd, res);
            }
            Instruction::And { rd, rs1, rs2 } => {
                let res = self.read_reg(rs1) & self.read_reg(rs2);
                self.write_reg(rd, res);
            }
            Instruction::Mul { rd, rs1, rs2 } => {
                let res = self.read_reg(rs1).wrapping_mul(self.read_reg(rs2));
                self.write_reg(rd, res);
            }
            Instruction::Mulh { rd, rs1, rs2 } => {
                let a = self.read_reg(rs1) as i32 as i64;
                let b = self.read_reg(rs2) as i32 as i64;
                self.write_reg(rd, ((a * b) >> 32) as u32);
            }
            Instruction::Mulhsu { rd, rs1, rs2 } => {
                let a = self.read_reg(rs1) as i32 as i128;
                let b = self.read_reg(rs2) as i128;
                self.write_reg(rd, ((a * b) >> 32) as u32);
            }
            Instruction::Mulhu { rd, rs1, rs2 } => {
                let a = self.read_reg(rs1) as u64;
                let b = self.read_reg(rs2) as u64;
                self.write_reg(rd, ((a * b) >> 32) as u32);
            }
            Instruction::Div { rd, rs1, rs2 } => {
                let a = self.read_reg(rs1) as i32;
                let b = self.read_reg(rs2) as i32;
                // division by zero yields -1; MIN / -1 wraps to MIN
                let res = if b == 0 { -1 } else { a.wrapping_div(b) };
                self.write_reg(rd, res as u32);
            }
            Instruction::Divu { rd, rs1, rs2 } => {
                let a = self.read_reg(rs1);
                let b = self.read_reg(rs2);
                let res = if b == 0 { u32::MAX } else { a / b };
                self.write_reg(rd, res);
            }
            Instruction::Rem { rd, rs1, rs2 } => {
                let a = self.read_reg(rs1) as i32;
                let b = self.read_reg(rs2) as i32;
                let res = if b == 0 { a } else { a.wrapping_rem(b) };
                self.write_reg(rd, res as u32);
            }
            Instruction::Remu { rd, rs1, rs2 } => {
                let a = self.read_reg(rs1);
                let b = self.read_reg(rs2);
                let res = if b == 0 { a } else { a % b };
                self.write_reg(rd, res);
            }
            Instruction::Csrrw { rd, rs1, csr } => {
                let operand = self.read_reg(rs1);
                self.csr_op(rd, csr, Some(operand), |_, new| new);
            }
            Instruction::Csrrs { rd, rs1, csr } => {
                let operand = (rs1 != 0).then(|| self.read_reg(rs1));
                self.csr_op(rd, csr, operand, |old, bits| old | bits);
            }
            Instruction::Csrrc { rd, rs1, csr } => {
                let operand = (rs1 != 0).then(|| self.read_reg(rs1));
                self.csr_op(rd, csr, operand, |old, bits| old & !bits);
            }
            Instruction::Csrrwi { rd, zimm, csr } => {
                self.csr_op(rd, csr, Some(zimm), |_, new| new);
            }
            Instruction::Csrrsi { rd, zimm, csr } => {
                let operand = (zimm != 0).then_some(zimm);
                self.csr_op(rd, csr, operand, |old, bits| old | bits);
            }
            Instruction::Csrrci { rd, zimm, csr } => {
                let operand = (zimm != 0).then_some(zimm);
                self.csr_op(rd, csr, operand, |old, bits| old & !bits);
            }
            Instruction::Fence | Instruction::Wfi => {
                // no interrupts, nothing to wait for
            }
            Instruction::Mret => {
                next_pc = self.csrs.read(csr::MEPC);
            }
            Instruction::Ecall | Instruction::Ebreak => {
                tracing::info!("{:?} at {:#x}, halting", instruction, self.pc);
                halted = true;
            }
            Instruction::Unknown(inst) => {
                tracing::error!("Unknown instruction {:#x} at {:#x}", inst, self.pc);
                return Err(SimulationError::DecodeError(self.pc as u64));
            }
        }

        for observer in observers {
            observer.on_step_end(1);
        }

        if halted {
            return Ok(StepOutcome::Halted);
        }
        if next_pc == self.pc {
            tracing::debug!("Jump to self at {:#x}, halting", self.pc);
            return Ok(StepOutcome::Halted);
        }

        self.pc = next_pc;
        Ok(StepOutcome::Continue)
    }

    fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }
    fn get_pc(&self) -> u32 {
        self.pc
    }
    fn set_sp(&mut self, val: u32) {
        self.write_reg(2, val); // x2 is SP
    }

    fn get_register(&self, id: u8) -> u32 {
        if id < 32 {
            self.read_reg(id)
        } else {
            0
        }
    }
    fn set_register(&mut self, id: u8, val: u32) {
        if id < 32 {
            self.write_reg(id, val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SystemBus;
    use crate::Machine;

    const RAM: u64 = 0x8000_0000;

    fn machine_with(program: &[u32]) -> Machine<RiscV> {
        let mut bus = SystemBus::new();
        bus.uart_mut().unwrap().set_echo(false);
        for (i, word) in program.iter().enumerate() {
            bus.write_u32(RAM + 4 * i as u64, *word).unwrap();
        }
        Machine::with_bus(bus)
    }

    #[test]
    fn test_riscv_addi() {
        // ADDI x1, x0, 5
        let mut machine = machine_with(&[0x0050_0093]);
        machine.step().unwrap();

        assert_eq!(machine.cpu.read_reg(1), 5);
        assert_eq!(machine.cpu.pc, 0x8000_0004);
    }

    #[test]
    fn test_riscv_beq_taken() {
        // 0: ADDI x1, x0, 10
        // 4: ADDI x2, x0, 10
        // 8: BEQ x1, x2, +8
        // 12: ADDI x3, x0, 1 (skipped)
        // 16: ADDI x4, x0, 1 (target)
        let mut machine = machine_with(&[
            0x00A0_0093,
            0x00A0_0113,
            0x0020_8463,
            0x0010_0193,
            0x0010_0213,
        ]);

        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.cpu.pc, 0x8000_0008);
        machine.step().unwrap();
        assert_eq!(machine.cpu.pc, 0x8000_0010);
        machine.step().unwrap();

        assert_eq!(machine.cpu.read_reg(4), 1);
        assert_eq!(machine.cpu.read_reg(3), 0);
    }

    #[test]
    fn test_x0_hardwired() {
        // ADDI x0, x0, 5
        let mut machine = machine_with(&[0x0050_0013]);
        machine.step().unwrap();
        assert_eq!(machine.cpu.read_reg(0), 0);
    }

    #[test]
    fn test_store_load_word() {
        // LUI x5, 0x80000      ; x5 = 0x8000_0000
        // ADDI x6, x0, -2      ; x6 = 0xFFFF_FFFE
        // SW x6, 256(x5)
        // LW x7, 256(x5)
        // LB x8, 256(x5)
        // LBU x9, 256(x5)
        let mut machine = machine_with(&[
            0x8000_02B7,
            0xFFE0_0313,
            0x1062_A023,
            0x1002_A383,
            0x1002_8403,
            0x1002_C483,
        ]);
        for _ in 0..6 {
            machine.step().unwrap();
        }
        assert_eq!(machine.cpu.read_reg(7), 0xFFFF_FFFE);
        assert_eq!(machine.cpu.read_reg(8), 0xFFFF_FFFE);
        assert_eq!(machine.cpu.read_reg(9), 0xFE);
    }

    /// Runs the four-instruction program with x10 = a, x11 = b and returns
    /// x12..=x15.
    fn run_rr(program: [u32; 4], a: u32, b: u32) -> [u32; 4] {
        let mut machine = machine_with(&program);
        machine.cpu.x[10] = a;
        machine.cpu.x[11] = b;
        for _ in 0..4 {
            machine.step().unwrap();
        }
        [12, 13, 14, 15].map(|r| machine.cpu.read_reg(r))
    }

    // DIV x12, REM x13, DIVU x14, REMU x15 (x10, x11)
    const DIVIDE: [u32; 4] = [0x02B5_4633, 0x02B5_66B3, 0x02B5_5733, 0x02B5_77B3];
    // MUL x12, MULH x13, MULHSU x14, MULHU x15 (x10, x11)
    const MULTIPLY: [u32; 4] = [0x02B5_0633, 0x02B5_16B3, 0x02B5_2733, 0x02B5_37B3];

    #[test]
    fn test_division_overflow() {
        let [div, rem, _, _] = run_rr(DIVIDE, i32::MIN as u32, -1i32 as u32);
        assert_eq!(div, i32::MIN as u32);
        assert_eq!(rem, 0);
    }

    #[test]
    fn test_division_by_zero() {
        let [div, rem, divu, remu] = run_rr(DIVIDE, i32::MIN as u32, 0);
        assert_eq!(div, u32::MAX);
        assert_eq!(rem, i32::MIN as u32);
        assert_eq!(divu, u32::MAX);
        assert_eq!(remu, i32::MIN as u32);
    }

    #[test]
    fn test_division_truncates() {
        // remainder takes the dividend's sign
        let [div, rem, divu, remu] = run_rr(DIVIDE, -125i32 as u32, 10);
        assert_eq!(div as i32, -12);
        assert_eq!(rem as i32, -5);
        assert_eq!(divu, (-125i32 as u32) / 10);
        assert_eq!(remu, (-125i32 as u32) % 10);
    }

    #[test]
    fn test_multiply_high() {
        let [mul, mulh, mulhsu, mulhu] = run_rr(MULTIPLY, -2i32 as u32, 3);
        assert_eq!(mul as i32, -6);
        assert_eq!(mulh, u32::MAX);
        assert_eq!(mulhsu, u32::MAX);
        assert_eq!(mulhu, 2);
    }

    #[test]
    fn test_m_extension_rejected_on_rv32i() {
        // DIV x12, x10, x11
        let mut machine = machine_with(&[0x02B5_4633]);
        machine.cpu = RiscV::for_arch("rv32i");
        assert_eq!(
            machine.step(),
            Err(SimulationError::DecodeError(0x8000_0000))
        );
    }

    #[test]
    fn test_csr_access() {
        // CSRR x5, mhartid
        // LUI x6, 0x80000
        // CSRW mtvec, x6       (CSRRW x0, mtvec, x6)
        // CSRR x7, mtvec
        let mut machine = machine_with(&[0xF140_22F3, 0x8000_0337, 0x3053_1073, 0x3050_23F3]);
        machine.cpu.x[5] = 0xAAAA;
        for _ in 0..4 {
            machine.step().unwrap();
        }
        assert_eq!(machine.cpu.read_reg(5), 0);
        assert_eq!(machine.cpu.csrs.read(csr::MTVEC), 0x8000_0000);
        assert_eq!(machine.cpu.read_reg(7), 0x8000_0000);
    }

    #[test]
    fn test_csr_set_clear_immediate() {
        let mut cpu = RiscV::new();
        cpu.csrs.write(csr::MSTATUS, 0b1000);
        // CSRRSI x1, mstatus, 3 ; CSRRCI x2, mstatus, 8
        cpu.csr_op(1, csr::MSTATUS, Some(3), |old, bits| old | bits);
        cpu.csr_op(2, csr::MSTATUS, Some(8), |old, bits| old & !bits);
        assert_eq!(cpu.read_reg(1), 0b1000);
        assert_eq!(cpu.read_reg(2), 0b1011);
        assert_eq!(cpu.csrs.read(csr::MSTATUS), 0b0011);
    }

    #[test]
    fn test_jump_to_self_halts() {
        // J .
        let mut machine = machine_with(&[0x0000_006F]);
        assert_eq!(machine.step(), Ok(StepOutcome::Halted));
        assert_eq!(machine.cpu.pc, 0x8000_0000);
    }

    #[test]
    fn test_ebreak_halts() {
        let mut machine = machine_with(&[0x0010_0073]);
        assert_eq!(machine.step(), Ok(StepOutcome::Halted));
    }

    #[test]
    fn test_unknown_instruction() {
        let mut machine = machine_with(&[0x0000_0000]);
        assert_eq!(
            machine.step(),
            Err(SimulationError::DecodeError(0x8000_0000))
        );
    }

    #[test]
    fn test_jal_jalr_link() {
        // 0: JAL x1, +8
        // 4: EBREAK
        // 8: JALR x0, 0(x1)   ; back to 4
        let mut machine = machine_with(&[0x0080_00EF, 0x0010_0073, 0x0000_8067]);
        machine.step().unwrap();
        assert_eq!(machine.cpu.pc, 0x8000_0008);
        assert_eq!(machine.cpu.read_reg(1), 0x8000_0004);
        machine.step().unwrap();
        assert_eq!(machine.cpu.pc, 0x8000_0004);
        assert_eq!(machine.step(), Ok(StepOutcome::Halted));
    }
}
