use crate::CharSink;

/// In-memory sink that can pretend to be busy for a number of polls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub bytes: Vec<u8>,
    pub polls: usize,
    busy_polls: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy_polls(busy_polls: usize) -> Self {
        Self {
            busy_polls,
            ..Self::default()
        }
    }

    pub fn output(&self) -> String {
        String::from_utf8(self.bytes.clone()).unwrap()
    }

    pub fn take_output(&mut self) -> String {
        String::from_utf8(std::mem::take(&mut self.bytes)).unwrap()
    }
}

impl CharSink for RecordingSink {
    fn is_ready(&mut self) -> bool {
        self.polls += 1;
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            false
        } else {
            true
        }
    }

    fn transmit(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
}
