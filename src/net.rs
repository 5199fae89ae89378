//! Websocket transport for [`SyncServer`].
//!
//! ## Tasks
//!
//! | Task           | Lifetime            | Job                                         |
//! |----------------|---------------------|---------------------------------------------|
//! | accept loop    | until `stop()`      | accept TCP, spawn one connection task each  |
//! | connection     | until closed        | read frames into the server                 |
//! | writer         | per connection      | drain the session channel into the socket   |
//! | heartbeat      | until `stop()`      | `SyncServer::heartbeat` every interval      |
//! | regrowth       | until `stop()`      | `SyncServer::regrow` after a random delay   |
//!
//! All tasks share one `Arc<Mutex<SyncServer>>`. The lock is never held
//! across an `.await`.
//!
//! When the server closes a session (timeout, shutdown) the writer sends the
//! close frame and signals the reader, which stops waiting for a reply. The
//! writer gets [`CLOSE_GRACE`] to finish before it is aborted, so a peer that
//! never reads cannot pin the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::Instrument;

use crate::service::SyncServer;
use crate::session::Outbound;

type Shared = Arc<Mutex<SyncServer>>;

/// How long a closing writer may take to flush before it is aborted.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// WorldServer
// ---------------------------------------------------------------------------

/// Owns a [`SyncServer`] until [`WorldServer::start`] puts it on a socket.
pub struct WorldServer {
    server: Shared,
}

impl WorldServer {
    pub fn new(server: SyncServer) -> Self {
        Self {
            server: Arc::new(Mutex::new(server)),
        }
    }

    /// Bind the configured address and spawn the accept loop and timers.
    pub async fn start(self) -> Result<ServerHandle> {
        let addr = self.server.lock().settings().addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener
            .local_addr()
            .context("Listener has no local address")?;

        info!("Listening on ws://{}", local_addr);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(accept_loop(listener, self.server.clone(), shutdown_rx.clone())),
            tokio::spawn(heartbeat_loop(self.server.clone(), shutdown_rx.clone())),
            tokio::spawn(regrowth_loop(self.server.clone(), shutdown_rx)),
        ];

        Ok(ServerHandle {
            local_addr,
            server: self.server,
            shutdown,
            tasks,
        })
    }
}

/// A running server. Dropping the handle leaves the tasks running; call
/// [`ServerHandle::stop`] to shut down.
pub struct ServerHandle {
    local_addr: SocketAddr,
    server: Shared,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn server(&self) -> Shared {
        self.server.clone()
    }

    /// Stop accepting, stop the timers and close every session.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Server task ended abnormally: {}", e);
            }
        }
        self.server.lock().close_all();
        info!("Server on {} stopped", self.local_addr);
    }
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

async fn accept_loop(listener: TcpListener, server: Shared, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let server = server.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, peer, server).await {
                            debug!("Connection from {} ended: {:#}", peer, e);
                        }
                    });
                }
                Err(e) => warn!("Accept failed: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn heartbeat_loop(server: Shared, mut shutdown: watch::Receiver<bool>) {
    let period = server.lock().settings().heartbeat_interval();
    let mut timer = tokio::time::interval(period);
    // The first tick completes immediately.
    timer.tick().await;

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let dropped = server.lock().heartbeat();
                if !dropped.is_empty() {
                    debug!("Heartbeat dropped sessions {:?}", dropped);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn regrowth_loop(server: Shared, mut shutdown: watch::Receiver<bool>) {
    loop {
        let delay = server.lock().next_regrowth_delay();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let planted = server.lock().regrow();
                debug!("Regrowth wrote {} tiles", planted);
            }
            _ = shutdown.changed() => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

async fn serve_connection(stream: TcpStream, peer: SocketAddr, server: Shared) -> Result<()> {
    let ws = accept_async(stream)
        .await
        .context("Websocket handshake failed")?;
    let (mut write, mut read) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (closed_tx, mut closed_rx) = oneshot::channel::<()>();
    let id = server.lock().connect(tx);
    let span = tracing::info_span!("session", id, %peer);

    async move {
        let mut writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let msg = match frame {
                    Outbound::Text(text) => Message::Text(text),
                    Outbound::Ping => Message::Ping(Vec::new()),
                    Outbound::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                };
                if write.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = closed_tx.send(());
            let _ = write.close().await;
        });

        if let Err(e) = server.lock().activate(id) {
            warn!("Activation failed: {}", e);
        }

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => server.lock().handle_text(id, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => server.lock().note_traffic(id),
                    Some(Err(e)) => {
                        debug!("Read error: {}", e);
                        break;
                    }
                },
                _ = &mut closed_rx => {
                    debug!("Writer closed, dropping reader");
                    break;
                }
            }
        }

        server.lock().disconnect(id);
        if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
            debug!("Writer did not finish within {:?}", CLOSE_GRACE);
            writer.abort();
        }
        drop(read);
    }
    .instrument(span)
    .await;

    Ok(())
}
