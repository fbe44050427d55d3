//! Fixed-capacity connection buffers.
//!
//! Both buffers are allocated once per connection and never grow. The read
//! buffer tracks three cursors:
//!
//! ```text
//! 0        line_start     checked        read            capacity
//! |  done  |  open line   |  unscanned   |     spare     |
//! ```
//!
//! with `line_start <= checked <= read <= capacity` holding after every
//! operation.

use std::fmt;

pub const READ_BUFFER_SIZE: usize = 2048;
pub const WRITE_BUFFER_SIZE: usize = 1024;

/// Half-open byte range into a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

pub struct ReadBuffer {
    pub(crate) buf: Box<[u8]>,
    pub(crate) read_idx: usize,
    pub(crate) checked_idx: usize,
    pub(crate) start_line: usize,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::with_capacity(READ_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            read_idx: 0,
            checked_idx: 0,
            start_line: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Next empty byte.
    pub fn read_idx(&self) -> usize {
        self.read_idx
    }

    /// Next byte the line scanner will classify.
    pub fn checked_idx(&self) -> usize {
        self.checked_idx
    }

    /// Start of the line currently being assembled.
    pub fn line_start(&self) -> usize {
        self.start_line
    }

    pub fn is_full(&self) -> bool {
        self.read_idx == self.buf.len()
    }

    /// Bytes received but not yet consumed by the parser.
    pub fn pending(&self) -> usize {
        self.read_idx - self.checked_idx
    }

    /// Room left for the next socket read.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.read_idx..]
    }

    /// Marks `n` bytes written into [`spare_mut`](Self::spare_mut) as received.
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.buf.len() - self.read_idx,
            "commit of {n} bytes overruns read buffer"
        );
        self.read_idx += n;
    }

    /// Copies as much of `data` as fits and returns the number of bytes taken.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let spare = self.spare_mut();
        let n = data.len().min(spare.len());
        spare[..n].copy_from_slice(&data[..n]);
        self.commit(n);
        n
    }

    pub fn get(&self, span: Span) -> &[u8] {
        &self.buf[span.start..span.end]
    }

    /// Consumes `len` unscanned bytes as one opaque block (a request body).
    ///
    /// Returns `None` if fewer than `len` bytes are buffered.
    pub fn take(&mut self, len: usize) -> Option<Span> {
        if self.pending() < len {
            return None;
        }
        let span = Span::new(self.checked_idx, self.checked_idx + len);
        self.checked_idx = span.end;
        self.start_line = span.end;
        Some(span)
    }

    /// Drops everything before `checked_idx`, moving unscanned bytes to the
    /// front. Spans handed out earlier are invalid afterwards.
    pub fn compact(&mut self) {
        let keep = self.checked_idx..self.read_idx;
        let len = keep.len();
        self.buf.copy_within(keep, 0);
        self.read_idx = len;
        self.checked_idx = 0;
        self.start_line = 0;
    }

    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.read_idx = 0;
        self.checked_idx = 0;
        self.start_line = 0;
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBuffer")
            .field("capacity", &self.buf.len())
            .field("read_idx", &self.read_idx)
            .field("checked_idx", &self.checked_idx)
            .field("start_line", &self.start_line)
            .finish()
    }
}

/// Returned when an append would not fit in the write buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("write buffer capacity exceeded")
    }
}

impl std::error::Error for Overflow {}

pub struct WriteBuffer {
    buf: Box<[u8]>,
    write_idx: usize,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::with_capacity(WRITE_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            write_idx: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes queued to send.
    pub fn len(&self) -> usize {
        self.write_idx
    }

    pub fn is_empty(&self) -> bool {
        self.write_idx == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.write_idx]
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<(), Overflow> {
        let end = self.write_idx + bytes.len();
        if end > self.buf.len() {
            return Err(Overflow);
        }
        self.buf[self.write_idx..end].copy_from_slice(bytes);
        self.write_idx = end;
        Ok(())
    }

    /// Formats `args` onto the end of the buffer. Either the whole piece is
    /// appended or the buffer is left as it was.
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), Overflow> {
        let mark = self.write_idx;
        if fmt::Write::write_fmt(self, args).is_err() {
            self.write_idx = mark;
            return Err(Overflow);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.write_idx = 0;
    }
}

impl fmt::Write for WriteBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WriteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBuffer")
            .field("capacity", &self.buf.len())
            .field("write_idx", &self.write_idx)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_keeps_unscanned_tail() {
        let mut buf = ReadBuffer::with_capacity(16);
        buf.extend(b"abcdefgh");
        buf.take(5).unwrap();
        buf.compact();

        assert_eq!(buf.read_idx(), 3);
        assert_eq!(buf.checked_idx(), 0);
        assert_eq!(buf.get(Span::new(0, 3)), b"fgh");
    }

    #[test]
    fn failed_format_leaves_buffer_untouched() {
        let mut buf = WriteBuffer::with_capacity(8);
        buf.push(b"abc").unwrap();
        assert_eq!(buf.push_fmt(format_args!("{}", "too long")), Err(Overflow));
        assert_eq!(buf.as_bytes(), b"abc");
    }
}
