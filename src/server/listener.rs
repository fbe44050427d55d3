use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use mio::net::TcpListener;
use mio::{Interest, Token};
use tracing::{debug, info, warn};

use crate::http::{Connection, Context};
use crate::server::Shared;

const BUSY: &[u8] = b"Internal server busy";

pub fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address {addr:?}"))?;
    let listener =
        TcpListener::bind(addr).with_context(|| format!("binding listener on {addr}"))?;
    info!("Listening on {}", addr);
    Ok(listener)
}

/// Accepts every pending connection and registers it for reading.
///
/// Sockets beyond the live-connection limit are told the server is busy and
/// closed on the spot.
pub(crate) fn accept_ready(
    listener: &TcpListener,
    shared: &Shared,
    ctx: &Arc<Context>,
    next_token: &mut usize,
) {
    loop {
        let (mut stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "accept failed");
                return;
            }
        };

        let Some(live) = ctx.live.try_acquire() else {
            warn!(%peer, max = ctx.live.max(), "connection limit reached");
            match stream.write(BUSY) {
                Ok(n) if n == BUSY.len() => {}
                Ok(n) => debug!(%peer, written = n, "short write of busy notice"),
                Err(e) => debug!(%peer, error = %e, "failed to send busy notice"),
            }
            continue;
        };

        let token = Token(*next_token);
        *next_token += 1;

        if let Err(e) = shared.registry.register(&mut stream, token, Interest::READABLE) {
            warn!(%peer, error = %e, "failed to register connection");
            continue;
        }

        let conn = Connection::new(stream, peer, Arc::clone(ctx), Some(live));
        shared.insert(token, conn);
        debug!(%peer, live = ctx.live.count(), "accepted connection");
    }
}
