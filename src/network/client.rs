use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::collections::SharedQueue;
use crate::message::{Message, OwnedMessage};
use crate::network::{Connection, ConnectionOptions};
use crate::service::{AppError, AppResult};

/// The initiating endpoint: one reactor thread, one connection.
///
/// `send` and `is_connected` are thin delegations to the connection; the
/// connect attempt itself completes asynchronously on the reactor, so a
/// freshly returned `connect()` may briefly report not-connected.
pub struct Client {
    inbound: Arc<SharedQueue<OwnedMessage>>,
    connection: Arc<Mutex<Option<Arc<Connection>>>>,
    stop_reactor: Option<oneshot::Sender<()>>,
    reactor_thread: Option<thread::JoinHandle<()>>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Client {
        Client {
            inbound: Arc::new(SharedQueue::new()),
            connection: Arc::new(Mutex::new(None)),
            stop_reactor: None,
            reactor_thread: None,
        }
    }

    /// Queues a connect attempt towards `host:port`, then starts the
    /// reactor thread. The attempt must be queued first or the reactor
    /// would have nothing to do. Connection failures are logged; there is
    /// no retry and no reconnection.
    pub fn connect(&mut self, host: &str, port: u16) -> AppResult<()> {
        if self.reactor_thread.is_some() {
            return Err(AppError::IllegalState(
                "client already has a reactor running".to_string(),
            ));
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let target = format!("{}:{}", host, port);
        let inbound = Arc::clone(&self.inbound);
        let slot = Arc::clone(&self.connection);
        let handle = runtime.handle().clone();
        runtime.spawn(async move {
            match Connection::active_connect(
                target.clone(),
                inbound,
                ConnectionOptions::default(),
                handle,
            )
            .await
            {
                Ok(connection) => {
                    info!("connected to server at {}", target);
                    *slot.lock() = Some(connection);
                }
                Err(e) => error!("failed connecting to the server: {}", e),
            }
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        self.stop_reactor = Some(stop_tx);
        self.reactor_thread = Some(
            thread::Builder::new()
                .name("client-reactor".to_string())
                .spawn(move || {
                    runtime.block_on(async {
                        let _ = stop_rx.await;
                    });
                    debug!("client reactor stopped");
                })?,
        );
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .map(|connection| connection.is_connected())
            .unwrap_or(false)
    }

    /// Sends a message to the server. Never blocks; a no-op while
    /// disconnected.
    pub fn send(&self, message: Message) {
        if let Some(connection) = self.connection.lock().as_ref() {
            connection.send(message);
        }
    }

    /// Pops one message the server sent back, if any. The deployed relay
    /// only ever sends client-to-server, but the protocol is symmetric.
    pub fn poll_message(&self) -> Option<OwnedMessage> {
        self.inbound.pop_front()
    }

    /// Tears the endpoint down: disconnect if needed, release the reactor,
    /// join its thread, drop the connection.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.lock().take() {
            if connection.is_connected() {
                connection.disconnect();
            }
        }
        if let Some(stop_tx) = self.stop_reactor.take() {
            let _ = stop_tx.send(());
        }
        if let Some(reactor) = self.reactor_thread.take() {
            if reactor.join().is_err() {
                error!("client reactor thread panicked");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}
