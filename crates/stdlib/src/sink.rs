/// A destination that accepts one byte at a time.
///
/// Implementors expose the readiness poll and the raw transmit separately so
/// the blocking behaviour of [`CharSink::putc`] stays the same whether the
/// sink is a hardware register or a simulated one.
pub trait CharSink {
    /// Returns `true` once the transport can accept another byte.
    fn is_ready(&mut self) -> bool;

    /// Hands `byte` to the transport without checking readiness.
    fn transmit(&mut self, byte: u8);

    /// Busy-waits until the sink is ready, then transmits `byte`.
    ///
    /// There is no timeout. A sink that never becomes ready blocks forever.
    fn putc(&mut self, byte: u8) {
        while !self.is_ready() {
            core::hint::spin_loop();
        }
        self.transmit(byte);
    }
}

impl<S: CharSink + ?Sized> CharSink for &mut S {
    fn is_ready(&mut self) -> bool {
        (**self).is_ready()
    }

    fn transmit(&mut self, byte: u8) {
        (**self).transmit(byte)
    }

    fn putc(&mut self, byte: u8) {
        (**self).putc(byte)
    }
}

/// Null-terminated string output layered on a [`CharSink`].
pub trait StringSink {
    /// Writes `s` byte by byte, stopping at the first NUL or at the end of
    /// the slice, whichever comes first.
    fn puts(&mut self, s: &[u8]);
}

impl<S: CharSink + ?Sized> StringSink for S {
    fn puts(&mut self, s: &[u8]) {
        for &byte in s.iter().take_while(|&&b| b != 0) {
            self.putc(byte);
        }
    }
}
