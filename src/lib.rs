//! tinyserve - non-blocking static file and form server
//!
//! Core library: request parsing, dispatch and response framing for
//! edge-triggered sockets, plus the event loop and pools that drive it.

pub mod config;
pub mod http;
pub mod server;
pub mod store;
pub mod sync;
