use tinyserve::http::buffer::{ReadBuffer, Span};
use tinyserve::http::line::LineStatus;

fn assert_cursors(buf: &ReadBuffer) {
    assert!(buf.line_start() <= buf.checked_idx());
    assert!(buf.checked_idx() <= buf.read_idx());
    assert!(buf.read_idx() <= buf.capacity());
}

#[test]
fn test_complete_line() {
    let mut buf = ReadBuffer::new();
    buf.extend(b"GET / HTTP/1.1\r\nHost");

    assert_eq!(buf.next_line(), LineStatus::Complete(Span::new(0, 14)));
    assert_eq!(buf.line_start(), 16);
    assert_eq!(buf.checked_idx(), 16);
    assert_eq!(buf.next_line(), LineStatus::Incomplete);
    assert_cursors(&buf);
}

#[test]
fn test_cr_at_end_of_buffer_is_incomplete() {
    let mut buf = ReadBuffer::new();
    buf.extend(b"Host: x\r");

    assert_eq!(buf.next_line(), LineStatus::Incomplete);
    assert_cursors(&buf);

    buf.extend(b"\n");
    assert_eq!(buf.next_line(), LineStatus::Complete(Span::new(0, 7)));
    assert_eq!(buf.get(Span::new(0, 7)), b"Host: x");
    assert_cursors(&buf);
}

#[test]
fn test_cr_followed_by_other_byte_is_malformed() {
    let mut buf = ReadBuffer::new();
    buf.extend(b"Host: x\rY\n");
    assert_eq!(buf.next_line(), LineStatus::Malformed);
}

#[test]
fn test_lone_lf_is_malformed() {
    let mut buf = ReadBuffer::new();
    buf.extend(b"Host: x\n");
    assert_eq!(buf.next_line(), LineStatus::Malformed);
}

#[test]
fn test_lf_right_after_a_complete_line_is_malformed() {
    let mut buf = ReadBuffer::new();
    buf.extend(b"a\r\n\nb\r\n");
    assert_eq!(buf.next_line(), LineStatus::Complete(Span::new(0, 1)));
    assert_eq!(buf.next_line(), LineStatus::Malformed);
    assert_eq!(buf.checked_idx(), 3);
}

#[test]
fn test_empty_line() {
    let mut buf = ReadBuffer::new();
    buf.extend(b"\r\n");
    assert_eq!(buf.next_line(), LineStatus::Complete(Span::new(0, 0)));
}

#[test]
fn test_unterminated_line_filling_buffer() {
    let mut buf = ReadBuffer::with_capacity(16);
    buf.extend(&[b'a'; 15]);
    assert_eq!(buf.next_line(), LineStatus::Incomplete);
    assert!(!buf.is_full());

    buf.extend(b"a");
    assert_eq!(buf.next_line(), LineStatus::Incomplete);
    assert!(buf.is_full());
    assert_cursors(&buf);
}

#[test]
fn test_byte_at_a_time_reassembly() {
    let input = b"first\r\nsecond\r\n";
    let mut buf = ReadBuffer::new();
    let mut lines = Vec::new();

    for byte in input {
        buf.extend(&[*byte]);
        while let LineStatus::Complete(span) = buf.next_line() {
            lines.push(buf.get(span).to_vec());
        }
        assert_cursors(&buf);
    }

    assert_eq!(lines, vec![b"first".to_vec(), b"second".to_vec()]);
}
