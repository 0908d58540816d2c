use std::collections::HashMap;

pub const MSTATUS: u16 = 0x300;
pub const MISA: u16 = 0x301;
pub const MIE: u16 = 0x304;
pub const MTVEC: u16 = 0x305;
pub const MEPC: u16 = 0x341;
pub const MIP: u16 = 0x344;
pub const MHARTID: u16 = 0xF14;

/// `misa` for RV32 with the I and optionally the M extension.
fn misa_value(m_extension: bool) -> u32 {
    let mut misa = (1 << 30) | (1 << 8);
    if m_extension {
        misa |= 1 << 12;
    }
    misa
}

/// Machine-mode CSR file. Only a single hart exists, so `mhartid` is always
/// zero. CSRs without special meaning behave as plain storage.
#[derive(Debug, Default)]
pub struct CsrFile {
    regs: HashMap<u16, u32>,
    misa: u32,
}

impl CsrFile {
    pub fn new(m_extension: bool) -> Self {
        Self {
            regs: HashMap::new(),
            misa: misa_value(m_extension),
        }
    }

    pub fn read(&self, csr: u16) -> u32 {
        match csr {
            MHARTID => 0,
            MISA => self.misa,
            _ => self.regs.get(&csr).copied().unwrap_or(0),
        }
    }

    pub fn write(&mut self, csr: u16, value: u32) {
        match csr {
            // read-only in this model
            MHARTID | MISA => {}
            _ => {
                self.regs.insert(csr, value);
            }
        }
    }

    pub fn clear(&mut self) {
        self.regs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_ids() {
        let mut csrs = CsrFile::new(true);
        csrs.write(MHARTID, 7);
        csrs.write(MISA, 0);
        assert_eq!(csrs.read(MHARTID), 0);
        assert_eq!(csrs.read(MISA), 0x4000_1100);
        assert_eq!(CsrFile::new(false).read(MISA), 0x4000_0100);
    }

    #[test]
    fn test_storage() {
        let mut csrs = CsrFile::new(true);
        assert_eq!(csrs.read(MTVEC), 0);
        csrs.write(MTVEC, 0x8000_0100);
        assert_eq!(csrs.read(MTVEC), 0x8000_0100);
        csrs.clear();
        assert_eq!(csrs.read(MTVEC), 0);
    }
}
