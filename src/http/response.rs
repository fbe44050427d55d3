use crate::http::buffer::{Overflow, WriteBuffer};

/// HTTP status codes the server emits.
///
/// - `Ok` (200): Request successful
/// - `BadRequest` (400): Malformed request
/// - `Forbidden` (403): Resource exists but may not be served
/// - `NotFound` (404): Resource not found
/// - `InternalServerError` (500): Server error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use tinyserve::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the reason phrase sent on the status line.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Error",
        }
    }

    /// Fixed body sent with an error status. Empty for `Ok`.
    pub fn error_body(&self) -> &'static str {
        match self {
            StatusCode::Ok => "",
            StatusCode::BadRequest => {
                "Your request has bad syntax or is inherently impossible to satisfy.\n"
            }
            StatusCode::Forbidden => "You do not have permission to get file from this server.\n",
            StatusCode::NotFound => "The requested file was not found on this server.\n",
            StatusCode::InternalServerError => {
                "There was an unusual problem serving the requested file.\n"
            }
        }
    }
}

/// Describes one response to be laid out in the write buffer.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHead<'a> {
    pub status: StatusCode,
    pub keep_alive: bool,
    /// Body bytes copied into the write buffer after the headers.
    pub inline: &'a [u8],
    /// Length of the file segment that follows the write buffer on the wire.
    pub file_len: usize,
    /// HEAD: advertise the length but send no body.
    pub head_only: bool,
}

impl ResponseHead<'_> {
    pub fn content_length(&self) -> usize {
        self.inline.len() + self.file_len
    }
}

/// Writes status line, headers and any inline body into `buf`.
///
/// Pieces go in a fixed order: status line, `Connection`, `Content-Length`,
/// `Content-Type`, blank line, inline body. On overflow the buffer is
/// cleared and nothing partial is left behind.
pub fn build(buf: &mut WriteBuffer, head: &ResponseHead<'_>) -> Result<(), Overflow> {
    buf.clear();
    let res = write_head(buf, head);
    if res.is_err() {
        buf.clear();
    }
    res
}

fn write_head(buf: &mut WriteBuffer, head: &ResponseHead<'_>) -> Result<(), Overflow> {
    buf.push_fmt(format_args!(
        "HTTP/1.1 {} {}\r\n",
        head.status.as_u16(),
        head.status.reason_phrase()
    ))?;
    let connection = if head.keep_alive { "keep-alive" } else { "close" };
    buf.push_fmt(format_args!("Connection: {connection}\r\n"))?;
    buf.push_fmt(format_args!("Content-Length: {}\r\n", head.content_length()))?;
    buf.push(b"Content-Type: text/html\r\n")?;
    buf.push(b"\r\n")?;
    if !head.head_only {
        buf.push(head.inline)?;
    }
    Ok(())
}
