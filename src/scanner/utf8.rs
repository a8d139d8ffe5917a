//! Multi-byte chunk-boundary holdback.
//!
//! A UTF-8 code point can be split across write boundaries. In text mode
//! the engine must never let a partial sequence into the scan buffer, so
//! the trailing incomplete sequence of each chunk is held back and
//! prefixed onto the next one. A sequence is 1-4 bytes:
//! 1 byte `0xxxxxxx`, 2 bytes `110xxxxx 10xxxxxx`,
//! 3 bytes `1110xxxx 10xxxxxx 10xxxxxx`, 4 bytes `11110xxx 10xxxxxx ...`.

/// Holds back the incomplete trailing sequence between writes.
#[derive(Debug, Default)]
pub(crate) struct Utf8Guard {
    held: [u8; 4],
    held_len: usize,
}

impl Utf8Guard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` to `out`, prefixed with any bytes held from the
    /// previous write and minus a trailing incomplete sequence, which is
    /// held for the next write.
    pub(crate) fn push(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        let appended_at = out.len();
        out.extend_from_slice(&self.held[..self.held_len]);
        self.held_len = 0;
        out.extend_from_slice(chunk);

        let keep = appended_at + complete_prefix_len(&out[appended_at..]);
        let tail = out.len() - keep;
        if tail > 0 {
            self.held[..tail].copy_from_slice(&out[keep..]);
            self.held_len = tail;
            out.truncate(keep);
        }
    }

    /// Flush held bytes verbatim. Used at stream end, where an incomplete
    /// sequence can no longer be completed and belongs to the caller.
    pub(crate) fn flush(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.held[..self.held_len]);
        self.held_len = 0;
    }

    /// Bytes currently held back.
    pub(crate) fn held(&self) -> &[u8] {
        &self.held[..self.held_len]
    }

    pub(crate) fn reset(&mut self) {
        self.held_len = 0;
    }
}

/// Length of the prefix of `bytes` that ends on a sequence boundary.
/// Malformed data is passed through untouched: only a genuinely
/// incomplete (but so far valid) trailing sequence is cut off.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    // a lead byte sits at most 3 positions from the end
    let floor = len.saturating_sub(4);
    let mut i = len;
    while i > floor {
        i -= 1;
        let b = bytes[i];
        if is_continuation(b) {
            continue;
        }
        let expected = sequence_length(b);
        let available = len - i;
        if available < expected {
            return i;
        }
        return len;
    }
    len
}

#[inline]
fn is_continuation(byte: u8) -> bool {
    (byte & 0b1100_0000) == 0b1000_0000
}

#[inline]
fn sequence_length(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1, // invalid lead, pass through as a single byte
    }
}
