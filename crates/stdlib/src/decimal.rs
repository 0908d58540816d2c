use crate::CharSink;

/// Writes `n` to `sink` as signed decimal text.
///
/// The digits are produced from the negated magnitude, so `isize::MIN` is
/// printed without ever being negated. Keep the order of the sign check and
/// the conditional negation as it is: taking `n.abs()` instead overflows on
/// the minimum value.
pub fn put_int<S: CharSink + ?Sized>(sink: &mut S, mut n: isize) {
    if n < 0 {
        sink.putc(b'-');
    }
    if n > 0 {
        n = -n;
    }
    put_nonpositive(sink, n);
}

// `n` is in [isize::MIN, 0]. Truncating division and remainder keep every
// intermediate value in that range and the remainder in [-9, 0].
fn put_nonpositive<S: CharSink + ?Sized>(sink: &mut S, n: isize) {
    if n <= -10 {
        put_nonpositive(sink, n / 10);
    }
    sink.putc((b'0' as isize - n % 10) as u8);
}
