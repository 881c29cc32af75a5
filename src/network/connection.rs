use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, Notify};
use tokio::time::{self, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::collections::SharedQueue;
use crate::message::{Header, Message, OwnedMessage};
use crate::service::{AppError, AppResult};

/// Which side of the TCP handshake this connection sits on.
///
/// The framing protocol is identical in both directions; the role only
/// decides whether delivered messages carry an owner reference and how
/// lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted by a listener.
    Server,
    /// Initiated towards a listener.
    Client,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    /// Cut the connection after this long without a received header.
    /// Armed on accepted connections only; `None` never disconnects.
    pub idle_timeout: Option<Duration>,
    /// Largest body a peer may declare in a header.
    pub max_frame_size: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            idle_timeout: None,
            max_frame_size: 1_048_576,
        }
    }
}

/// Why a read step ended without producing bytes.
enum ReadEnd {
    /// `disconnect()` was called from elsewhere; teardown already ran.
    Closed,
    /// No header arrived within the idle window.
    IdleTimeout,
    Io(io::Error),
}

/// One framed TCP connection: an independent receive chain, an outbound
/// queue drained by at most one write chain, and an idle deadline.
///
/// Every in-flight chain and the server registry hold a strong reference,
/// so the connection stays alive until the last of them lets go.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    role: Role,
    options: ConnectionOptions,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<BufWriter<OwnedWriteHalf>>>,
    outbound: SharedQueue<Message>,
    inbound: Arc<SharedQueue<OwnedMessage>>,
    connected: AtomicBool,
    closed: Notify,
    handle: Handle,
}

impl Connection {
    pub fn new(
        role: Role,
        socket: TcpStream,
        inbound: Arc<SharedQueue<OwnedMessage>>,
        options: ConnectionOptions,
        handle: Handle,
    ) -> Arc<Connection> {
        let (read_half, write_half) = socket.into_split();
        Arc::new(Connection {
            id: Uuid::new_v4(),
            role,
            options,
            reader: Mutex::new(Some(read_half)),
            writer: Mutex::new(Some(BufWriter::new(write_half))),
            outbound: SharedQueue::new(),
            inbound,
            connected: AtomicBool::new(true),
            closed: Notify::new(),
            handle,
        })
    }

    /// Connects to `target` and starts the receive chain on success.
    ///
    /// Client-role connections never arm the idle timer, whatever the
    /// options say.
    pub(crate) async fn active_connect(
        target: String,
        inbound: Arc<SharedQueue<OwnedMessage>>,
        mut options: ConnectionOptions,
        handle: Handle,
    ) -> AppResult<Arc<Connection>> {
        options.idle_timeout = None;
        let socket = TcpStream::connect(&target).await?;
        let connection = Connection::new(Role::Client, socket, inbound, options, handle);
        connection.spawn_receive_chain();
        Ok(connection)
    }

    /// Starts serving a freshly accepted socket: the idle timer is armed and
    /// the receive chain begins awaiting the first header.
    pub(crate) fn begin_passive_serve(self: &Arc<Self>) {
        if !self.is_connected() {
            error!("[{}] cannot serve: socket is already disconnected", self.id);
            return;
        }
        self.spawn_receive_chain();
    }

    fn spawn_receive_chain(self: &Arc<Self>) {
        self.handle.spawn(Arc::clone(self).receive_loop());
    }

    /// Random identifier assigned at construction, stable for the lifetime
    /// of the connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Enqueues a message for sending. Never blocks; a no-op when the
    /// connection is down.
    ///
    /// A write chain is started only when the queue was empty immediately
    /// before this push; otherwise the chain already working through the
    /// queue picks the message up after the current head. The queue reports
    /// that atomically with the insertion, so a chain draining to empty at
    /// the same moment cannot leave the message stranded with no chain
    /// running. This keeps at most one outstanding write on the socket.
    pub fn send(self: &Arc<Self>, message: Message) {
        if !self.is_connected() {
            return;
        }
        if self.outbound.push_back(message) {
            self.handle.spawn(Arc::clone(self).drain_outbound());
        }
    }

    /// Closes the connection. Idempotent; safe from any thread.
    ///
    /// The socket teardown itself is posted to the reactor so chains that
    /// are mid-await observe the close rather than racing it.
    pub fn disconnect(self: &Arc<Self>) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        match self.role {
            Role::Server => info!("[{}] disconnected", self.id),
            Role::Client => info!("disconnected from server"),
        }
        self.closed.notify_waiters();

        let connection = Arc::clone(self);
        self.handle.spawn(async move {
            if let Some(mut writer) = connection.writer.lock().await.take() {
                let _ = writer.shutdown().await;
            }
            connection.reader.lock().await.take();
        });
    }

    /// The receive chain: header, then a body of exactly the declared
    /// length, delivered to the inbound queue, forever until an error,
    /// an idle expiry or a disconnect.
    async fn receive_loop(self: Arc<Self>) {
        let taken = self.reader.lock().await.take();
        let Some(mut reader) = taken else {
            return;
        };
        let idle = self.options.idle_timeout;
        let mut deadline = idle.map(|timeout| Instant::now() + timeout);

        loop {
            if !self.is_connected() {
                return;
            }

            let mut raw_header = [0u8; Header::WIRE_SIZE];
            match self.read_step(&mut reader, &mut raw_header, deadline).await {
                Ok(()) => {}
                Err(ReadEnd::Closed) => return,
                Err(ReadEnd::IdleTimeout) => {
                    info!("[{}] idle timeout expired", self.id);
                    self.disconnect();
                    return;
                }
                Err(ReadEnd::Io(e)) => {
                    error!("failed to read the header: {}", e);
                    self.disconnect();
                    return;
                }
            }

            // only a received header pushes the idle deadline forward;
            // outbound traffic deliberately does not
            deadline = idle.map(|timeout| Instant::now() + timeout);

            let header = Header::decode(raw_header);
            if header.body_size == 0 {
                // an empty frame carries nothing to deliver
                continue;
            }
            if header.body_size as usize > self.options.max_frame_size {
                error!("{}", AppError::FrameTooLarge(header.body_size));
                self.disconnect();
                return;
            }

            let mut body = vec![0u8; header.body_size as usize];
            match self.read_step(&mut reader, &mut body, deadline).await {
                Ok(()) => {}
                Err(ReadEnd::Closed) => return,
                Err(ReadEnd::IdleTimeout) => {
                    info!("[{}] idle timeout expired", self.id);
                    self.disconnect();
                    return;
                }
                Err(ReadEnd::Io(e)) => {
                    error!("failed to read the body: {}", e);
                    self.disconnect();
                    return;
                }
            }

            let owner = match self.role {
                Role::Server => Some(Arc::clone(&self)),
                Role::Client => None,
            };
            self.inbound
                .push_back(OwnedMessage::new(owner, Message::new(Bytes::from(body))));
        }
    }

    /// One outstanding read, racing the idle deadline and the close signal.
    async fn read_step(
        &self,
        reader: &mut OwnedReadHalf,
        buf: &mut [u8],
        deadline: Option<Instant>,
    ) -> Result<(), ReadEnd> {
        match deadline {
            Some(deadline) => tokio::select! {
                res = reader.read_exact(buf) => res.map(|_| ()).map_err(ReadEnd::Io),
                _ = time::sleep_until(deadline) => Err(ReadEnd::IdleTimeout),
                _ = self.closed.notified() => Err(ReadEnd::Closed),
            },
            None => tokio::select! {
                res = reader.read_exact(buf) => res.map(|_| ()).map_err(ReadEnd::Io),
                _ = self.closed.notified() => Err(ReadEnd::Closed),
            },
        }
    }

    /// The write chain: drains the outbound queue onto the socket, one
    /// message at a time, and ends when the queue runs dry.
    ///
    /// A message is popped only after it is fully written, so the queue
    /// stays non-empty while a write is in flight and `send` cannot start
    /// a second chain. Holding the writer for the whole drain makes the
    /// single-writer invariant structural.
    async fn drain_outbound(self: Arc<Self>) {
        let mut slot = self.writer.lock().await;
        while let Some(message) = self.outbound.front() {
            let Some(writer) = slot.as_mut() else {
                return;
            };
            if let Err(e) = write_frame(writer, &message).await {
                drop(slot);
                error!("failed to write the frame: {}", e);
                self.disconnect();
                return;
            }
            self.outbound.pop_front();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("[{}] connection dropped", self.id);
    }
}

async fn write_frame(
    writer: &mut BufWriter<OwnedWriteHalf>,
    message: &Message,
) -> io::Result<()> {
    writer.write_all(&message.header().encode()).await?;
    if !message.is_empty() {
        writer.write_all(message.body()).await?;
    }
    writer.flush().await
}
