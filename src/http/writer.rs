//! Two-segment scatter write bookkeeping.
//!
//! Segment 0 is the header portion of the write buffer, segment 1 the
//! mapped file. Only offsets live here; the bytes stay where they are and
//! are handed to a single vectored write on every attempt.

use std::io::IoSlice;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segments {
    header_pos: usize,
    header_end: usize,
    file_pos: usize,
    file_end: usize,
}

impl Segments {
    pub fn new(header_len: usize, file_len: usize) -> Self {
        Self {
            header_pos: 0,
            header_end: header_len,
            file_pos: 0,
            file_end: file_len,
        }
    }

    /// Number of segments prepared: 1 for header-only responses, 2 when a
    /// file follows.
    pub fn count(&self) -> usize {
        if self.file_end > 0 { 2 } else { 1 }
    }

    pub fn header_remaining(&self) -> usize {
        self.header_end - self.header_pos
    }

    pub fn file_remaining(&self) -> usize {
        self.file_end - self.file_pos
    }

    pub fn remaining(&self) -> usize {
        self.header_remaining() + self.file_remaining()
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Slices still to be sent, header first. `header` and `file` must be the
    /// same buffers the segment lengths were computed from.
    pub fn io_slices<'a>(&self, header: &'a [u8], file: &'a [u8]) -> ([IoSlice<'a>; 2], usize) {
        let head = &header[self.header_pos..self.header_end];
        let body = &file[self.file_pos..self.file_end];

        if head.is_empty() {
            ([IoSlice::new(body), IoSlice::new(&[])], 1)
        } else if body.is_empty() {
            ([IoSlice::new(head), IoSlice::new(&[])], 1)
        } else {
            ([IoSlice::new(head), IoSlice::new(body)], 2)
        }
    }

    /// Records `n` bytes as written, draining the header before the file.
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.remaining(), "advanced past the end of the response");

        let from_header = n.min(self.header_remaining());
        self.header_pos += from_header;
        self.file_pos += n - from_header;
    }
}
