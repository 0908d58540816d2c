pub mod csr;
pub mod riscv;

pub use riscv::RiscV;
