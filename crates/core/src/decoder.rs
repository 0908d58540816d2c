//! RV32I + M + Zicsr instruction decoding.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, imm: i32 },
    Jalr { rd: u8, rs1: u8, imm: i32 },

    Beq { rs1: u8, rs2: u8, imm: i32 },
    Bne { rs1: u8, rs2: u8, imm: i32 },
    Blt { rs1: u8, rs2: u8, imm: i32 },
    Bge { rs1: u8, rs2: u8, imm: i32 },
    Bltu { rs1: u8, rs2: u8, imm: i32 },
    Bgeu { rs1: u8, rs2: u8, imm: i32 },

    Lb { rd: u8, rs1: u8, imm: i32 },
    Lh { rd: u8, rs1: u8, imm: i32 },
    Lw { rd: u8, rs1: u8, imm: i32 },
    Lbu { rd: u8, rs1: u8, imm: i32 },
    Lhu { rd: u8, rs1: u8, imm: i32 },

    Sb { rs1: u8, rs2: u8, imm: i32 },
    Sh { rs1: u8, rs2: u8, imm: i32 },
    Sw { rs1: u8, rs2: u8, imm: i32 },

    Addi { rd: u8, rs1: u8, imm: i32 },
    Slti { rd: u8, rs1: u8, imm: i32 },
    Sltiu { rd: u8, rs1: u8, imm: i32 },
    Xori { rd: u8, rs1: u8, imm: i32 },
    Ori { rd: u8, rs1: u8, imm: i32 },
    Andi { rd: u8, rs1: u8, imm: i32 },
    Slli { rd: u8, rs1: u8, shamt: u32 },
    Srli { rd: u8, rs1: u8, shamt: u32 },
    Srai { rd: u8, rs1: u8, shamt: u32 },

    Add { rd: u8, rs1: u8, rs2: u8 },
    Sub { rd: u8, rs1: u8, rs2: u8 },
    Sll { rd: u8, rs1: u8, rs2: u8 },
    Slt { rd: u8, rs1: u8, rs2: u8 },
    Sltu { rd: u8, rs1: u8, rs2: u8 },
    Xor { rd: u8, rs1: u8, rs2: u8 },
    Srl { rd: u8, rs1: u8, rs2: u8 },
    Sra { rd: u8, rs1: u8, rs2: u8 },
    Or { rd: u8, rs1: u8, rs2: u8 },
    And { rd: u8, rs1: u8, rs2: u8 },

    // M extension
    Mul { rd: u8, rs1: u8, rs2: u8 },
    Mulh { rd: u8, rs1: u8, rs2: u8 },
    Mulhsu { rd: u8, rs1: u8, rs2: u8 },
    Mulhu { rd: u8, rs1: u8, rs2: u8 },
    Div { rd: u8, rs1: u8, rs2: u8 },
    Divu { rd: u8, rs1: u8, rs2: u8 },
    Rem { rd: u8, rs1: u8, rs2: u8 },
    Remu { rd: u8, rs1: u8, rs2: u8 },

    // Zicsr
    Csrrw { rd: u8, rs1: u8, csr: u16 },
    Csrrs { rd: u8, rs1: u8, csr: u16 },
    Csrrc { rd: u8, rs1: u8, csr: u16 },
    Csrrwi { rd: u8, zimm: u32, csr: u16 },
    Csrrsi { rd: u8, zimm: u32, csr: u16 },
    Csrrci { rd: u8, zimm: u32, csr: u16 },

    Fence,
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    Unknown(u32),
}

impl Instruction {
    /// True for the M-extension multiply/divide group.
    pub fn is_m_extension(&self) -> bool {
        matches!(
            self,
            Instruction::Mul { .. }
                | Instruction::Mulh { .. }
                | Instruction::Mulhsu { .. }
                | Instruction::Mulhu { .. }
                | Instruction::Div { .. }
                | Instruction::Divu { .. }
                | Instruction::Rem { .. }
                | Instruction::Remu { .. }
        )
    }
}

fn imm_i(inst: u32) -> i32 {
    (inst as i32) >> 20
}

fn imm_s(inst: u32) -> i32 {
    (((inst as i32) >> 25) << 5) | ((inst >> 7) & 0x1F) as i32
}

fn imm_b(inst: u32) -> i32 {
    (((inst as i32) >> 31) << 12)
        | (((inst >> 7) & 0x1) << 11) as i32
        | (((inst >> 25) & 0x3F) << 5) as i32
        | (((inst >> 8) & 0xF) << 1) as i32
}

fn imm_j(inst: u32) -> i32 {
    (((inst as i32) >> 31) << 20)
        | (inst & 0x000F_F000) as i32
        | (((inst >> 20) & 0x1) << 11) as i32
        | (((inst >> 21) & 0x3FF) << 1) as i32
}

/// Decodes a 32-bit RISC-V instruction word.
pub fn decode_rv32(inst: u32) -> Instruction {
    let opcode = inst & 0x7F;
    let rd = ((inst >> 7) & 0x1F) as u8;
    let funct3 = (inst >> 12) & 0x7;
    let rs1 = ((inst >> 15) & 0x1F) as u8;
    let rs2 = ((inst >> 20) & 0x1F) as u8;
    let funct7 = inst >> 25;

    match opcode {
        0x37 => Instruction::Lui {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        0x17 => Instruction::Auipc {
            rd,
            imm: inst & 0xFFFF_F000,
        },
        0x6F => Instruction::Jal { rd, imm: imm_j(inst) },
        0x67 if funct3 == 0 => Instruction::Jalr {
            rd,
            rs1,
            imm: imm_i(inst),
        },
        0x63 => {
            let imm = imm_b(inst);
            match funct3 {
                0 => Instruction::Beq { rs1, rs2, imm },
                1 => Instruction::Bne { rs1, rs2, imm },
                4 => Instruction::Blt { rs1, rs2, imm },
                5 => Instruction::Bge { rs1, rs2, imm },
                6 => Instruction::Bltu { rs1, rs2, imm },
                7 => Instruction::Bgeu { rs1, rs2, imm },
                _ => Instruction::Unknown(inst),
            }
        }
        0x03 => {
            let imm = imm_i(inst);
            match funct3 {
                0 => Instruction::Lb { rd, rs1, imm },
                1 => Instruction::Lh { rd, rs1, imm },
                2 => Instruction::Lw { rd, rs1, imm },
                4 => Instruction::Lbu { rd, rs1, imm },
                5 => Instruction::Lhu { rd, rs1, imm },
                _ => Instruction::Unknown(inst),
            }
        }
        0x23 => {
            let imm = imm_s(inst);
            match funct3 {
                0 => Instruction::Sb { rs1, rs2, imm },
                1 => Instruction::Sh { rs1, rs2, imm },
                2 => Instruction::Sw { rs1, rs2, imm },
                _ => Instruction::Unknown(inst),
            }
        }
        0x13 => {
            let imm = imm_i(inst);
            let shamt = (inst >> 20) & 0x1F;
            match (funct3, funct7) {
                (0, _) => Instruction::Addi { rd, rs1, imm },
                (2, _) => Instruction::Slti { rd, rs1, imm },
                (3, _) => Instruction::Sltiu { rd, rs1, imm },
                (4, _) => Instruction::Xori { rd, rs1, imm },
                (6, _) => Instruction::Ori { rd, rs1, imm },
                (7, _) => Instruction::Andi { rd, rs1, imm },
                (1, 0x00) => Instruction::Slli { rd, rs1, shamt },
                (5, 0x00) => Instruction::Srli { rd, rs1, shamt },
                (5, 0x20) => Instruction::Srai { rd, rs1, shamt },
                _ => Instruction::Unknown(inst),
            }
        }
        0x33 => match (funct7, funct3) {
            (0x00, 0) => Instruction::Add { rd, rs1, rs2 },
            (0x20, 0) => Instruction::Sub { rd, rs1, rs2 },
            (0x00, 1) => Instruction::Sll { rd, rs1, rs2 },
            (0x00, 2) => Instruction::Slt { rd, rs1, rs2 },
            (0x00, 3) => Instruction::Sltu { rd, rs1, rs2 },
            (0x00, 4) => Instruction::Xor { rd, rs1, rs2 },
            (0x00, 5) => Instruction::Srl { rd, rs1, rs2 },
            (0x20, 5) => Instruction::Sra { rd, rs1, rs2 },
            (0x00, 6) => Instruction::Or { rd, rs1, rs2 },
            (0x00, 7) => Instruction::And { rd, rs1, rs2 },
            (0x01, 0) => Instruction::Mul { rd, rs1, rs2 },
            (0x01, 1) => Instruction::Mulh { rd, rs1, rs2 },
            (0x01, 2) => Instruction::Mulhsu { rd, rs1, rs2 },
            (0x01, 3) => Instruction::Mulhu { rd, rs1, rs2 },
            (0x01, 4) => Instruction::Div { rd, rs1, rs2 },
            (0x01, 5) => Instruction::Divu { rd, rs1, rs2 },
            (0x01, 6) => Instruction::Rem { rd, rs1, rs2 },
            (0x01, 7) => Instruction::Remu { rd, rs1, rs2 },
            _ => Instruction::Unknown(inst),
        },
        // FENCE and FENCE.I
        0x0F if funct3 <= 1 => Instruction::Fence,
        0x73 => {
            let csr = (inst >> 20) as u16;
            match funct3 {
                0 => match inst {
                    0x0000_0073 => Instruction::Ecall,
                    0x0010_0073 => Instruction::Ebreak,
                    0x3020_0073 => Instruction::Mret,
                    0x1050_0073 => Instruction::Wfi,
                    _ => Instruction::Unknown(inst),
                },
                1 => Instruction::Csrrw { rd, rs1, csr },
                2 => Instruction::Csrrs { rd, rs1, csr },
                3 => Instruction::Csrrc { rd, rs1, csr },
                5 => Instruction::Csrrwi {
                    rd,
                    zimm: rs1 as u32,
                    csr,
                },
                6 => Instruction::Csrrsi {
                    rd,
                    zimm: rs1 as u32,
                    csr,
                },
                7 => Instruction::Csrrci {
                    rd,
                    zimm: rs1 as u32,
                    csr,
                },
                _ => Instruction::Unknown(inst),
            }
        }
        _ => Instruction::Unknown(inst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_addi() {
        // ADDI x1, x0, 5
        assert_eq!(
            decode_rv32(0x0050_0093),
            Instruction::Addi { rd: 1, rs1: 0, imm: 5 }
        );
        // ADDI x2, x2, -16
        assert_eq!(
            decode_rv32(0xFF01_0113),
            Instruction::Addi { rd: 2, rs1: 2, imm: -16 }
        );
    }

    #[test]
    fn test_decode_lui() {
        // LUI x10, 0x10010
        assert_eq!(
            decode_rv32(0x1001_0537),
            Instruction::Lui { rd: 10, imm: 0x1001_0000 }
        );
    }

    #[test]
    fn test_decode_branches() {
        // BEQ x1, x2, 8
        assert_eq!(
            decode_rv32(0x0020_8463),
            Instruction::Beq { rs1: 1, rs2: 2, imm: 8 }
        );
        // BLT x5, x0, -4
        assert_eq!(
            decode_rv32(0xFE02_CEE3),
            Instruction::Blt { rs1: 5, rs2: 0, imm: -4 }
        );
    }

    #[test]
    fn test_decode_jal() {
        // J . (JAL x0, 0)
        assert_eq!(decode_rv32(0x0000_006F), Instruction::Jal { rd: 0, imm: 0 });
        // JAL x1, 2048
        assert_eq!(
            decode_rv32(0x0010_00EF),
            Instruction::Jal { rd: 1, imm: 2048 }
        );
        // JAL x0, -8
        assert_eq!(
            decode_rv32(0xFF9F_F06F),
            Instruction::Jal { rd: 0, imm: -8 }
        );
    }

    #[test]
    fn test_decode_loads_stores() {
        // LW x6, 0(x10)
        assert_eq!(
            decode_rv32(0x0005_2303),
            Instruction::Lw { rd: 6, rs1: 10, imm: 0 }
        );
        // SW x11, 0(x10)
        assert_eq!(
            decode_rv32(0x00B5_2023),
            Instruction::Sw { rs1: 10, rs2: 11, imm: 0 }
        );
        // SW x1, -4(x2)
        assert_eq!(
            decode_rv32(0xFE11_2E23),
            Instruction::Sw { rs1: 2, rs2: 1, imm: -4 }
        );
    }

    #[test]
    fn test_decode_m_extension() {
        // DIV x12, x10, x11
        let div = decode_rv32(0x02B5_4633);
        assert_eq!(div, Instruction::Div { rd: 12, rs1: 10, rs2: 11 });
        assert!(div.is_m_extension());
        // REM x13, x10, x11
        assert_eq!(
            decode_rv32(0x02B5_66B3),
            Instruction::Rem { rd: 13, rs1: 10, rs2: 11 }
        );
        assert!(!decode_rv32(0x0050_0093).is_m_extension());
    }

    #[test]
    fn test_decode_system() {
        assert_eq!(decode_rv32(0x0000_0073), Instruction::Ecall);
        assert_eq!(decode_rv32(0x0010_0073), Instruction::Ebreak);
        assert_eq!(decode_rv32(0x3020_0073), Instruction::Mret);
        assert_eq!(decode_rv32(0x1050_0073), Instruction::Wfi);
        // CSRR x5, mhartid (CSRRS x5, mhartid, x0)
        assert_eq!(
            decode_rv32(0xF140_22F3),
            Instruction::Csrrs { rd: 5, rs1: 0, csr: 0xF14 }
        );
        // CSRWI mie, 0 (CSRRWI x0, mie, 0)
        assert_eq!(
            decode_rv32(0x3040_5073),
            Instruction::Csrrwi { rd: 0, zimm: 0, csr: 0x304 }
        );
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(decode_rv32(0x0000_0000), Instruction::Unknown(0));
        // compressed encodings are not supported
        assert_eq!(decode_rv32(0x0000_4501), Instruction::Unknown(0x4501));
    }
}
