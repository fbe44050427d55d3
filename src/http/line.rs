//! Line reassembly over the read buffer.
//!
//! A line ends with CR LF. Lines may arrive split across any number of reads,
//! so the scanner only ever moves `checked_idx` forward over bytes it has
//! fully classified and picks up from there on the next call.

use crate::http::buffer::{ReadBuffer, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// A terminated line, without its CR LF.
    Complete(Span),
    /// A CR not followed by LF, or an LF not preceded by CR.
    Malformed,
    /// No terminator among the buffered bytes yet.
    Incomplete,
}

impl ReadBuffer {
    /// Scans for the next CR LF terminated line starting at `line_start`.
    ///
    /// On success the terminator is overwritten with NULs and both
    /// `line_start` and `checked_idx` move past it. A CR in the last buffered
    /// byte is reported as [`LineStatus::Incomplete`] and left unscanned, so
    /// an LF arriving in the next read still completes the line.
    pub fn next_line(&mut self) -> LineStatus {
        while self.checked_idx < self.read_idx {
            let pos = self.checked_idx;
            match self.buf[pos] {
                b'\r' => {
                    if pos + 1 == self.read_idx {
                        return LineStatus::Incomplete;
                    }
                    if self.buf[pos + 1] != b'\n' {
                        return LineStatus::Malformed;
                    }
                    self.buf[pos] = 0;
                    self.buf[pos + 1] = 0;
                    return self.finish_line(pos, pos + 2);
                }
                // Any CR before it was consumed together with its LF.
                b'\n' => return LineStatus::Malformed,
                _ => self.checked_idx += 1,
            }
        }

        LineStatus::Incomplete
    }

    fn finish_line(&mut self, line_end: usize, next: usize) -> LineStatus {
        let line = Span::new(self.start_line, line_end);
        self.checked_idx = next;
        self.start_line = next;
        LineStatus::Complete(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_is_nulled_in_place() {
        let mut buf = ReadBuffer::with_capacity(16);
        buf.extend(b"ab\r\n");
        assert_eq!(buf.next_line(), LineStatus::Complete(Span::new(0, 2)));
        assert_eq!(&buf.buf[..4], b"ab\0\0");
    }
}
