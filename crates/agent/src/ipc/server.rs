// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accept loop and per-connection framing for the control socket.
//!
//! Connections are newline-delimited JSON with a hard per-frame cap; a
//! client that buffers more than the cap without a newline is disconnected.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::daemon::CoreMsg;
use crate::limits::MAX_MESSAGE_SIZE;
use crate::protocol::ConnId;

/// Run the accept loop until shutdown. Each connection gets an id, an
/// outbound line channel registered with the core, and its own task.
pub async fn serve(
    listener: UnixListener,
    core_tx: mpsc::Sender<CoreMsg>,
    shutdown: CancellationToken,
) {
    let mut next_conn: ConnId = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        next_conn += 1;
                        let conn = next_conn;
                        let (out_tx, out_rx) = mpsc::unbounded_channel();
                        if core_tx.send(CoreMsg::Connected { conn, tx: out_tx }).await.is_err() {
                            break;
                        }
                        tokio::spawn(connection_task(
                            conn,
                            stream,
                            core_tx.clone(),
                            out_rx,
                            shutdown.clone(),
                        ));
                    }
                    Err(error) => {
                        debug!(%error, "socket accept error");
                    }
                }
            }
        }
    }
}

async fn connection_task(
    conn: ConnId,
    stream: UnixStream,
    core_tx: mpsc::Sender<CoreMsg>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
) {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            outbound = out_rx.recv() => {
                match outbound {
                    Some(line) => {
                        if framed.send(line).await.is_err() {
                            break;
                        }
                    }
                    // Core dropped this connection's sender.
                    None => break,
                }
            }

            inbound = framed.next() => {
                match inbound {
                    Some(Ok(line)) => {
                        // Empty lines are skipped silently.
                        if line.trim().is_empty() {
                            continue;
                        }
                        if core_tx.send(CoreMsg::Line { conn, line }).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!(conn, "frame exceeded {MAX_MESSAGE_SIZE} bytes, disconnecting client");
                        break;
                    }
                    Some(Err(error)) => {
                        debug!(conn, %error, "socket read error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = core_tx.send(CoreMsg::Disconnected { conn }).await;
}
