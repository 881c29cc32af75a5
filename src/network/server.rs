use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::runtime::{Builder, Handle};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info};

use crate::collections::{SharedQueue, SharedVec};
use crate::message::OwnedMessage;
use crate::network::{Connection, ConnectionOptions, Role};
use crate::service::{AppError, AppResult, ServerConfig, Shutdown};

/// The accepting endpoint.
///
/// Owns the reactor thread, a perpetual accept loop, the live-connection
/// registry and the inbound message queue. Decoded messages are handed to
/// the application through [`Server::run`], called repeatedly from the
/// caller's own thread.
pub struct Server {
    config: ServerConfig,
    inbound: Arc<SharedQueue<OwnedMessage>>,
    connections: Arc<SharedVec<Arc<Connection>>>,
    notify_shutdown: broadcast::Sender<()>,
    stop_reactor: Option<oneshot::Sender<()>>,
    reactor_thread: Option<thread::JoinHandle<()>>,
    stop_housekeeping: Arc<AtomicBool>,
    housekeeping_thread: Option<thread::JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Server {
        let (notify_shutdown, _) = broadcast::channel(1);
        Server {
            config,
            inbound: Arc::new(SharedQueue::new()),
            connections: Arc::new(SharedVec::new()),
            notify_shutdown,
            stop_reactor: None,
            reactor_thread: None,
            stop_housekeeping: Arc::new(AtomicBool::new(false)),
            housekeeping_thread: None,
            local_addr: None,
        }
    }

    /// Binds the listener and starts the reactor and housekeeping threads.
    ///
    /// The accept loop is queued onto the runtime before the reactor thread
    /// starts, so the reactor always has pending work from its first tick.
    pub fn start(&mut self) -> AppResult<()> {
        if self.reactor_thread.is_some() {
            return Err(AppError::IllegalState("server already started".to_string()));
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let listener = runtime.block_on(TcpListener::bind(self.config.listen_address()))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("listening on {}", local_addr);

        let options = ConnectionOptions {
            idle_timeout: Some(self.config.idle_timeout()),
            max_frame_size: self.config.network.max_frame_size,
        };
        runtime.spawn(Self::accept_loop(
            listener,
            Arc::clone(&self.inbound),
            Arc::clone(&self.connections),
            options,
            runtime.handle().clone(),
            Shutdown::subscribe(&self.notify_shutdown),
        ));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        self.stop_reactor = Some(stop_tx);
        self.reactor_thread = Some(
            thread::Builder::new()
                .name("server-reactor".to_string())
                .spawn(move || {
                    runtime.block_on(async {
                        let _ = stop_rx.await;
                    });
                    debug!("server reactor stopped");
                })?,
        );

        self.housekeeping_thread = Some(Self::start_housekeeping(
            Arc::clone(&self.connections),
            Arc::clone(&self.stop_housekeeping),
            self.config.sweep_interval(),
        )?);

        info!("server started");
        Ok(())
    }

    /// Perpetual accept loop: every accepted socket becomes a server-role
    /// connection, is registered, and starts serving; the loop itself is the
    /// re-arm. Accept errors are logged and the loop keeps going.
    async fn accept_loop(
        listener: TcpListener,
        inbound: Arc<SharedQueue<OwnedMessage>>,
        connections: Arc<SharedVec<Arc<Connection>>>,
        options: ConnectionOptions,
        handle: Handle,
        mut shutdown: Shutdown,
    ) {
        loop {
            let accepted = tokio::select! {
                res = listener.accept() => res,
                _ = shutdown.recv() => {
                    debug!("accept loop exiting after shutdown signal");
                    return;
                }
            };
            match accepted {
                Ok((socket, peer)) => {
                    info!("connection from {}", peer);
                    let connection = Connection::new(
                        Role::Server,
                        socket,
                        Arc::clone(&inbound),
                        options,
                        handle.clone(),
                    );
                    connections.push_back(Arc::clone(&connection));
                    connection.begin_passive_serve();
                }
                Err(e) => error!("failed to accept a new connection: {}", e),
            }
        }
    }

    /// Periodic reclamation of dead registry entries. Coarse by design: a
    /// disconnected connection may linger for up to one sweep interval.
    fn start_housekeeping(
        connections: Arc<SharedVec<Arc<Connection>>>,
        stop: Arc<AtomicBool>,
        sweep_interval: Duration,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("housekeeping".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    // wait for the registry to hold at least one entry
                    if !connections.wait_timeout(Duration::from_secs(1)) {
                        continue;
                    }
                    connections.remove_if(|connection| !connection.is_connected());

                    // sleep off the interval in slices so a stop request
                    // is honored promptly
                    let deadline = Instant::now() + sweep_interval;
                    while Instant::now() < deadline && !stop.load(Ordering::Acquire) {
                        thread::sleep(Duration::from_millis(100));
                    }
                }
                debug!("housekeeping thread stopped");
            })
    }

    /// Waits briefly for inbound messages, then hands every currently
    /// queued message to `on_message` and returns. Callers invoke this in a
    /// loop; the bounded wait lets that loop interleave its own stop checks.
    pub fn run<F>(&self, mut on_message: F)
    where
        F: FnMut(OwnedMessage),
    {
        self.inbound.wait_timeout(Duration::from_millis(500));
        while let Some(owned) = self.inbound.pop_front() {
            on_message(owned);
        }
    }

    /// Actual bound address, useful when the configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Registry entries, live or not yet swept.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Stops the server. Ordering matters: stop accepting, close the
    /// sockets, release the reactor, then join reactor and housekeeping
    /// threads. Idempotent.
    pub fn stop(&mut self) {
        if self.reactor_thread.is_none() && self.housekeeping_thread.is_none() {
            return;
        }
        info!("server stopping");
        let _ = self.notify_shutdown.send(());
        self.connections.for_each(|connection| connection.disconnect());
        if let Some(stop_tx) = self.stop_reactor.take() {
            let _ = stop_tx.send(());
        }
        if let Some(reactor) = self.reactor_thread.take() {
            if reactor.join().is_err() {
                error!("server reactor thread panicked");
            }
        }
        self.stop_housekeeping.store(true, Ordering::Release);
        if let Some(housekeeping) = self.housekeeping_thread.take() {
            if housekeeping.join().is_err() {
                error!("housekeeping thread panicked");
            }
        }
        self.connections.clear();
        // undrained messages hold their owning connections, which in turn
        // hold this queue; dropping them here breaks that cycle
        self.inbound.clear();
        info!("server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::network::Client;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.network.ip = "127.0.0.1".to_string();
        config.network.port = 0;
        config.network.sweep_interval_secs = 1;
        config
    }

    #[test]
    fn test_start_and_stop() {
        let mut server = Server::new(test_config());
        server.start().unwrap();
        assert!(server.local_addr().is_some());
        assert_eq!(server.connection_count(), 0);
        server.stop();
        // stop is idempotent
        server.stop();
    }

    #[test]
    fn test_stop_releases_queued_messages() {
        let mut server = Server::new(test_config());
        server.start().unwrap();
        let port = server.local_addr().unwrap().port();

        let mut client = Client::new();
        client.connect("127.0.0.1", port).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !client.is_connected() {
            assert!(Instant::now() < deadline, "client never connected");
            thread::sleep(Duration::from_millis(20));
        }

        // leave the message queued; nobody drains it before the stop
        client.send(Message::from_text("undrained"));
        let deadline = Instant::now() + Duration::from_secs(5);
        while server.inbound.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!server.inbound.is_empty());

        let mut weak = None;
        server
            .connections
            .for_each(|connection| weak = Some(Arc::downgrade(connection)));
        let weak = weak.expect("one registered connection");

        client.disconnect();
        server.stop();
        assert!(
            weak.upgrade().is_none(),
            "a queued message must not keep its connection alive past stop"
        );
    }

    #[test]
    fn test_double_start_is_rejected() {
        let mut server = Server::new(test_config());
        server.start().unwrap();
        assert!(server.start().is_err());
        server.stop();
    }
}
