//! Per-connection request/response cycle.
//!
//! A [`Connection`] is driven from outside by whichever worker currently
//! owns it: `read_once` after a readable notification, then `process`, then
//! `write` after each writable notification until the response is drained.
//! None of these block; each returns what the socket should be re-armed for.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::http::buffer::{Overflow, ReadBuffer, WriteBuffer};
use crate::http::context::{Context, LiveToken};
use crate::http::mapped::MappedFile;
use crate::http::parser::{ParseStatus, RequestParser};
use crate::http::request::Method;
use crate::http::response::{self, ResponseHead, StatusCode};
use crate::http::router::Outcome;
use crate::http::writer::Segments;

/// What the connection needs next from the readiness mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Read,
    Write,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Bytes (possibly none) were buffered and the peer is still there.
    Open,
    /// The peer closed its end.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The socket stopped accepting bytes; resume on the next writable event.
    Pending,
    /// Everything was sent.
    Done { keep_alive: bool },
}

/// Response waiting to be written.
#[derive(Debug, Default)]
enum Pending {
    #[default]
    Idle,
    /// Header in the write buffer, body in the mapping.
    Static(MappedFile),
    /// Whole response generated into the write buffer.
    Dynamic,
}

pub struct Connection<S> {
    peer: SocketAddr,
    ctx: Arc<Context>,
    read: ReadBuffer,
    write: WriteBuffer,
    parser: RequestParser,
    pending: Pending,
    segments: Segments,
    bytes_to_send: usize,
    bytes_have_send: usize,
    keep_alive: bool,
    last_active: Instant,
    closed: bool,
    live: Option<LiveToken>,
    // Declared last: on drop the live slot is released before the socket closes.
    stream: S,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, peer: SocketAddr, ctx: Arc<Context>, live: Option<LiveToken>) -> Self {
        let parser = RequestParser::new(Arc::clone(&ctx.index));
        Self {
            peer,
            ctx,
            read: ReadBuffer::new(),
            write: WriteBuffer::new(),
            parser,
            pending: Pending::Idle,
            segments: Segments::default(),
            bytes_to_send: 0,
            bytes_have_send: 0,
            keep_alive: false,
            last_active: Instant::now(),
            closed: false,
            live,
            stream,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn read_buffer(&self) -> &ReadBuffer {
        &self.read
    }

    pub fn write_buffer(&self) -> &WriteBuffer {
        &self.write
    }

    pub fn segments(&self) -> &Segments {
        &self.segments
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn bytes_to_send(&self) -> usize {
        self.bytes_to_send
    }

    pub fn bytes_have_send(&self) -> usize {
        self.bytes_have_send
    }

    pub fn has_mapping(&self) -> bool {
        matches!(self.pending, Pending::Static(_))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Direction the connection is waiting on.
    pub fn wants(&self) -> Next {
        if self.closed {
            Next::Close
        } else if matches!(self.pending, Pending::Idle) {
            Next::Read
        } else {
            Next::Write
        }
    }

    /// True if bytes of a following request are already buffered.
    pub fn has_buffered(&self) -> bool {
        self.read.pending() > 0
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Reads until the socket would block, the buffer is full, or the peer
    /// closes.
    pub fn read_once(&mut self) -> io::Result<ReadStatus> {
        self.last_active = Instant::now();

        loop {
            let spare = self.read.spare_mut();
            if spare.is_empty() {
                return Ok(ReadStatus::Open);
            }

            match self.stream.read(spare) {
                Ok(0) => return Ok(ReadStatus::Closed),
                Ok(n) => self.read.commit(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadStatus::Open),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Parses whatever is buffered and, once a request is complete or
    /// rejected, lays out the response.
    pub fn process(&mut self) -> Next {
        self.last_active = Instant::now();

        let (outcome, keep_alive, head_only) = match self.parser.parse(&mut self.read) {
            Ok(ParseStatus::Incomplete) => return Next::Read,
            Ok(ParseStatus::Complete(req)) => {
                debug!(
                    peer = %self.peer,
                    method = req.method.as_str(),
                    url = %req.url,
                    host = req.host.as_deref().unwrap_or("-"),
                    "parsed request"
                );
                let outcome = self.ctx.router.dispatch(&req);
                (outcome, req.keep_alive, req.method == Method::HEAD)
            }
            Err(e) => {
                warn!(peer = %self.peer, error = ?e, "bad request");
                (Outcome::BadRequest, false, false)
            }
        };

        match self.process_write(outcome, keep_alive, head_only) {
            Ok(()) => Next::Write,
            Err(_) => Next::Close,
        }
    }

    fn process_write(
        &mut self,
        outcome: Outcome,
        keep_alive: bool,
        head_only: bool,
    ) -> Result<(), Overflow> {
        let status = outcome.status();
        // Unparseable clients and internal failures never keep the connection.
        self.keep_alive = keep_alive
            && !matches!(
                status,
                StatusCode::BadRequest | StatusCode::InternalServerError
            );

        let built = match outcome {
            Outcome::File(file) => {
                let head = ResponseHead {
                    status,
                    keep_alive: self.keep_alive,
                    inline: &[],
                    file_len: file.len(),
                    head_only,
                };
                let built = response::build(&mut self.write, &head);
                if built.is_ok() {
                    let file_len = if head_only { 0 } else { file.len() };
                    self.arm(file_len);
                    if file_len > 0 {
                        self.pending = Pending::Static(file);
                    }
                }
                built
            }
            Outcome::Page(_, body) => self.build_inline(status, &body, head_only),
            _ => self.build_inline(status, status.error_body().as_bytes(), head_only),
        };

        if built.is_ok() {
            return Ok(());
        }

        warn!(peer = %self.peer, status = status.as_u16(), "response overflows write buffer");
        self.keep_alive = false;
        let status = StatusCode::InternalServerError;
        self.build_inline(status, status.error_body().as_bytes(), head_only)
    }

    fn build_inline(
        &mut self,
        status: StatusCode,
        body: &[u8],
        head_only: bool,
    ) -> Result<(), Overflow> {
        let head = ResponseHead {
            status,
            keep_alive: self.keep_alive,
            inline: body,
            file_len: 0,
            head_only,
        };
        response::build(&mut self.write, &head)?;
        self.arm(0);
        Ok(())
    }

    fn arm(&mut self, file_len: usize) {
        self.pending = Pending::Dynamic;
        self.segments = Segments::new(self.write.len(), file_len);
        self.bytes_to_send = self.write.len() + file_len;
        self.bytes_have_send = 0;
        debug_assert_eq!(self.segments.remaining(), self.bytes_to_send);
    }

    /// Sends as much of the pending response as the socket takes.
    ///
    /// On completion the mapping is released; with keep-alive the
    /// connection is reset for the next request, keeping any bytes of it
    /// that were already read.
    pub fn write(&mut self) -> io::Result<WriteStatus> {
        self.last_active = Instant::now();

        if self.bytes_to_send == 0 {
            return Ok(self.finish_response());
        }

        loop {
            let file: &[u8] = match &self.pending {
                Pending::Static(file) => file.as_bytes(),
                _ => &[],
            };
            let (slices, count) = self.segments.io_slices(self.write.as_bytes(), file);

            match self.stream.write_vectored(&slices[..count]) {
                Ok(0) => {
                    self.unmap();
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(n) => {
                    self.segments.advance(n);
                    self.bytes_have_send += n;
                    self.bytes_to_send -= n;
                    if self.bytes_to_send == 0 {
                        return Ok(self.finish_response());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(WriteStatus::Pending),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.unmap();
                    return Err(e);
                }
            }
        }
    }

    fn finish_response(&mut self) -> WriteStatus {
        self.unmap();
        self.pending = Pending::Idle;
        let keep_alive = self.keep_alive;
        if keep_alive {
            self.init();
        }
        WriteStatus::Done { keep_alive }
    }

    /// Resets per-request state. Unparsed bytes of a pipelined request stay.
    fn init(&mut self) {
        self.parser.reset();
        self.read.compact();
        self.write.clear();
        self.pending = Pending::Idle;
        self.segments = Segments::default();
        self.bytes_to_send = 0;
        self.bytes_have_send = 0;
        self.keep_alive = false;
    }

    fn unmap(&mut self) {
        if let Pending::Static(file) = &self.pending {
            debug!(path = %file.path().display(), "released mapping");
            self.pending = Pending::Idle;
        }
    }

    /// Releases everything the connection holds besides the socket itself.
    /// The socket closes when the connection is dropped.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.unmap();
        self.pending = Pending::Idle;
        self.closed = true;
        self.live = None;
        debug!(peer = %self.peer, live = self.ctx.live.count(), "connection closed");
    }
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("parser", &self.parser.state())
            .field("pending", &self.pending)
            .field("bytes_to_send", &self.bytes_to_send)
            .field("bytes_have_send", &self.bytes_have_send)
            .field("keep_alive", &self.keep_alive)
            .field("closed", &self.closed)
            .finish()
    }
}
