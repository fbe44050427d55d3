//! HTTP/1.1 request handling over non-blocking sockets.
//!
//! # Architecture
//!
//! - **`buffer`**: fixed-capacity read/write buffers and their cursors
//! - **`line`**: reassembles CR LF terminated lines across partial reads
//! - **`parser`**: request-line / headers / body state machine
//! - **`request`**: parsed request representation
//! - **`router`**: maps a request to a file, a synthesized page or a store query
//! - **`response`**: status codes and header formatting into the write buffer
//! - **`writer`**: two-segment scatter write cursor
//! - **`connection`**: ties the above together behind `read_once` / `process` / `write`
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← read_once + process until a request completes
//!        └──────┬──────┘
//!               │ complete or bad request
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← write, resumed on every writable event
//!        └──────┬───────────┘
//!               │ response drained, mapping released
//!               ├─ Keep-Alive → Reading (same connection, buffered bytes kept)
//!               └─ Close → Closed
//! ```

pub mod buffer;
pub mod connection;
pub mod context;
pub mod line;
pub mod mapped;
pub mod pages;
pub mod parser;
pub mod request;
pub mod response;
pub mod router;
pub mod writer;

pub use connection::{Connection, Next, ReadStatus, WriteStatus};
pub use context::{Context, LiveConnections, LiveToken};
pub use router::{Outcome, Router};
