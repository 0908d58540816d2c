use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u64,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u64) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    pub fn total_size(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }
}

/// A simple flat memory storage
#[derive(Debug)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u64,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u64) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    fn offset_of(&self, addr: u64) -> Option<usize> {
        let offset = addr.checked_sub(self.base_addr)?;
        (offset < self.data.len() as u64).then_some(offset as usize)
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.offset_of(addr).is_some()
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        self.offset_of(addr).map(|offset| self.data[offset])
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        match self.offset_of(addr) {
            Some(offset) => {
                self.data[offset] = value;
                true
            }
            None => false,
        }
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        let Some(offset) = segment.start_addr.checked_sub(self.base_addr) else {
            return false;
        };
        let fits = (offset as u128 + segment.data.len() as u128) <= self.data.len() as u128;
        if !fits {
            return false;
        }
        let offset = offset as usize;
        self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
        true
    }
}
