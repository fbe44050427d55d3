//! Request state machine.
//!
//! Consumes lines from the line scanner and moves strictly forward through
//! `RequestLine -> Headers -> Content`. Each call runs until the request is
//! complete, it is rejected, or the buffer runs out of bytes; all progress
//! lives in the parser fields and the buffer cursors, so the next call
//! resumes exactly where this one stopped.

use std::sync::Arc;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::http::buffer::ReadBuffer;
use crate::http::line::LineStatus;
use crate::http::request::{Method, Request};

const VERSION_PREFIX: &str = "HTTP/1.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    RequestLine,
    Headers,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Bare CR or bare LF in a line terminator
    MalformedLine,
    /// Buffer filled up before the line ended
    LineTooLong,
    InvalidRequest,
    InvalidMethod,
    InvalidUrl,
    InvalidVersion,
    InvalidHeader,
    InvalidContentLength,
    /// Declared body can never fit in the read buffer
    BodyTooLarge,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseStatus {
    /// More bytes are needed; read again and call `parse` once more.
    Incomplete,
    Complete(Request),
}

#[derive(Debug)]
pub struct RequestParser {
    state: CheckState,
    index: Arc<str>,
    method: Option<Method>,
    url: String,
    version: String,
    host: Option<String>,
    content_length: usize,
    keep_alive: bool,
}

impl RequestParser {
    /// `index` is the resource served for an empty path, without the
    /// leading slash (e.g. `"judge.html"`).
    pub fn new(index: impl Into<Arc<str>>) -> Self {
        Self {
            state: CheckState::RequestLine,
            index: index.into(),
            method: None,
            url: String::new(),
            version: String::new(),
            host: None,
            content_length: 0,
            keep_alive: false,
        }
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    /// Forgets any partially parsed request.
    pub fn reset(&mut self) {
        self.state = CheckState::RequestLine;
        self.method = None;
        self.url.clear();
        self.version.clear();
        self.host = None;
        self.content_length = 0;
        self.keep_alive = false;
    }

    pub fn parse(&mut self, buf: &mut ReadBuffer) -> Result<ParseStatus, ParseError> {
        loop {
            if self.state == CheckState::Content {
                return self.parse_content(buf);
            }

            let span = match buf.next_line() {
                LineStatus::Complete(span) => span,
                LineStatus::Malformed => return Err(ParseError::MalformedLine),
                LineStatus::Incomplete if buf.is_full() => return Err(ParseError::LineTooLong),
                LineStatus::Incomplete => return Ok(ParseStatus::Incomplete),
            };
            let line = buf.get(span);

            match self.state {
                CheckState::RequestLine => self.parse_request_line(line)?,
                CheckState::Headers => {
                    if line.is_empty() {
                        if self.content_length > 0 {
                            self.state = CheckState::Content;
                            continue;
                        }
                        return Ok(ParseStatus::Complete(self.finish(Bytes::new())));
                    }
                    self.parse_header(line)?;
                }
                CheckState::Content => unreachable!("content is handled before line scanning"),
            }
        }
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let text = std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequest)?;
        let mut parts = text.split([' ', '\t']).filter(|p| !p.is_empty());

        let method = parts.next().ok_or(ParseError::InvalidRequest)?;
        let target = parts.next().ok_or(ParseError::InvalidRequest)?;
        let version = parts.next().ok_or(ParseError::InvalidRequest)?;
        if parts.next().is_some() {
            return Err(ParseError::InvalidRequest);
        }

        let method = Method::from_str(method).ok_or(ParseError::InvalidMethod)?;
        if !version
            .get(..VERSION_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(VERSION_PREFIX))
        {
            return Err(ParseError::InvalidVersion);
        }

        self.url = normalize_target(target, &self.index)?;
        self.method = Some(method);
        self.version = version.to_string();
        self.state = CheckState::Headers;
        Ok(())
    }

    fn parse_header(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let text = std::str::from_utf8(line).map_err(|_| ParseError::InvalidHeader)?;
        let (name, value) = text.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let value = value.trim_matches([' ', '\t']);

        if name.eq_ignore_ascii_case("Connection") {
            if value.eq_ignore_ascii_case("keep-alive") {
                self.keep_alive = true;
            }
        } else if name.eq_ignore_ascii_case("Content-Length") {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::InvalidContentLength);
            }
            self.content_length = value
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength)?;
        } else if name.eq_ignore_ascii_case("Host") {
            self.host = Some(value.to_string());
        } else {
            tracing::trace!(header = name, "ignoring unknown header");
        }

        Ok(())
    }

    fn parse_content(&mut self, buf: &mut ReadBuffer) -> Result<ParseStatus, ParseError> {
        if let Some(span) = buf.take(self.content_length) {
            let body = Bytes::copy_from_slice(buf.get(span));
            return Ok(ParseStatus::Complete(self.finish(body)));
        }

        if buf.checked_idx() + self.content_length > buf.capacity() {
            return Err(ParseError::BodyTooLarge);
        }

        Ok(ParseStatus::Incomplete)
    }

    fn finish(&mut self, body: Bytes) -> Request {
        Request {
            method: self.method.unwrap_or(Method::GET),
            url: std::mem::take(&mut self.url),
            version: std::mem::take(&mut self.version),
            host: self.host.take(),
            content_length: self.content_length,
            keep_alive: self.keep_alive,
            body,
        }
    }
}

/// Reduces a request target to a clean, decoded absolute path.
///
/// Absolute-form targets (`http://host/path`) lose their scheme and
/// authority. An origin-form target keeps every path segment, including
/// after repeated leading slashes. Dot segments are resolved so the result
/// never climbs above `/`, the query string is dropped, percent escapes are
/// decoded and `/` maps to the index resource.
pub fn normalize_target(target: &str, index: &str) -> Result<String, ParseError> {
    let lower = target.get(..8).map(str::to_ascii_lowercase).unwrap_or_default();
    let url = if lower.starts_with("http://") || lower.starts_with("https://") {
        Url::parse(target).map_err(|_| ParseError::InvalidUrl)?
    } else if target.starts_with('/') {
        // Joined as a path-only reference so `//x` is never read as an authority.
        let path = format!("/{}", target.trim_start_matches('/'));
        Url::parse("http://localhost")
            .and_then(|base| base.join(&path))
            .map_err(|_| ParseError::InvalidUrl)?
    } else {
        return Err(ParseError::InvalidUrl);
    };

    let path = percent_decode_str(url.path())
        .decode_utf8()
        .map_err(|_| ParseError::InvalidUrl)?;
    // Escaped separators survive dot-segment removal; refuse them here.
    if path.contains('\0') || path.split('/').any(|seg| seg == "..") {
        return Err(ParseError::InvalidUrl);
    }

    if path == "/" {
        return Ok(format!("/{index}"));
    }
    Ok(path.into_owned())
}
