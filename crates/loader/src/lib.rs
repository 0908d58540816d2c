// Testbench - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::header::EM_RISCV;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use std::fs;
use std::path::Path;
use testbench_core::memory::ProgramImage;
use tracing::{debug, info, warn};

/// Largest `p_memsz` accepted for a single segment.
pub const MAX_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    load_elf_bytes(&buffer).with_context(|| format!("Invalid firmware image: {:?}", path))
}

/// Builds a [`ProgramImage`] from a 32-bit little-endian RISC-V executable.
///
/// Every `PT_LOAD` segment is placed at its physical address and padded with
/// zeros up to `p_memsz`, which is how `.bss` ends up cleared.
pub fn load_elf_bytes(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    if elf.is_64 {
        bail!("Expected a 32-bit ELF, found ELF64");
    }
    if !elf.little_endian {
        bail!("Expected a little-endian ELF");
    }
    if elf.header.e_machine != EM_RISCV {
        bail!(
            "Unsupported machine type {} (expected RISC-V, {})",
            elf.header.e_machine,
            EM_RISCV
        );
    }

    info!("ELF Entry Point: {:#x}", elf.entry);

    let mut program_image = ProgramImage::new(elf.entry);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_memsz == 0 {
            continue;
        }

        let start_addr = ph.p_paddr;
        if ph.p_memsz > MAX_SEGMENT_SIZE {
            bail!(
                "Segment at {:#x} claims {} bytes, more than the {} byte limit",
                start_addr,
                ph.p_memsz,
                MAX_SEGMENT_SIZE
            );
        }
        if start_addr.checked_add(ph.p_memsz).map_or(true, |end| end > 1 << 32) {
            bail!(
                "Segment at {:#x}+{:#x} lies outside the 32-bit address space",
                start_addr,
                ph.p_memsz
            );
        }

        let file_size = ph.p_filesz as usize;
        let mem_size = ph.p_memsz as usize;
        let offset = ph.p_offset as usize;

        if file_size > mem_size {
            bail!(
                "Segment at {:#x} has p_filesz {} larger than p_memsz {}",
                start_addr,
                file_size,
                mem_size
            );
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, FileSize={} bytes, MemSize={} bytes, Offset={:#x}",
            start_addr, file_size, mem_size, offset
        );

        let end = offset
            .checked_add(file_size)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;

        let mut segment_data = Vec::new();
        segment_data.try_reserve_exact(mem_size).with_context(|| {
            format!(
                "Cannot allocate {} bytes for segment at {:#x}",
                mem_size, start_addr
            )
        })?;
        segment_data.extend_from_slice(&buffer[offset..end]);
        segment_data.resize(mem_size, 0);
        program_image.add_segment(start_addr, segment_data);
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}
