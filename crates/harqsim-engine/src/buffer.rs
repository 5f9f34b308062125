//! Bit and soft-value buffer primitives used by the HARQ engine.
//!
//! The source reservoir is read linearly with zero padding at its end. The
//! coded-bit buffer is circular: a transmission longer than the buffer
//! repeats it, and soft values received for those positions are added back
//! at the same circular offsets.

/// Read `count` bits from `buffer` at `start`, zero-padding past the end.
///
/// Never wraps. A `start` at or beyond the end yields all zeros.
pub fn extract_with_zero_padding(buffer: &[u8], start: usize, count: usize) -> Vec<u8> {
    let available = buffer.len().saturating_sub(start).min(count);
    let mut out = Vec::with_capacity(count);
    if available > 0 {
        out.extend_from_slice(&buffer[start..start + available]);
    }
    out.resize(count, 0);
    out
}

/// Read `count` elements from `buffer` treated as a ring starting at `start`.
///
/// Element `k` of the result is `buffer[(start + k) % buffer.len()]`, so a
/// request longer than the buffer repeats it as many times as needed. An
/// empty buffer yields an empty result.
pub fn extract_with_wraparound<T: Copy>(buffer: &[T], start: usize, count: usize) -> Vec<T> {
    let len = buffer.len();
    if len == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(count);
    let mut pos = start % len;
    while out.len() < count {
        let take = (len - pos).min(count - out.len());
        out.extend_from_slice(&buffer[pos..pos + take]);
        pos = 0;
    }
    out
}

/// Add `values` into `buffer` treated as a ring starting at `start`.
///
/// `values[k]` lands on `buffer[(start + k) % buffer.len()]`, so positions
/// covered more than once accumulate every contribution. Mirrors
/// [`extract_with_wraparound`].
pub fn accumulate_with_wraparound(buffer: &mut [f64], start: usize, values: &[f64]) {
    let len = buffer.len();
    if len == 0 {
        return;
    }
    let mut pos = start % len;
    for &v in values {
        buffer[pos] += v;
        pos += 1;
        if pos == len {
            pos = 0;
        }
    }
}
