//! Networking core of the relay.
//!
//! One [`Connection`] wraps one TCP socket and runs the framing state
//! machine: a continuously re-armed receive chain, an outbound queue drained
//! by at most one write chain, and an idle deadline on accepted connections.
//!
//! The endpoint roles own the reactor: a current-thread tokio runtime driven
//! by a dedicated OS thread, so all completions for one endpoint run
//! cooperatively on a single thread. Cross-thread handoff happens only at
//! the inbound queue, the per-connection outbound queue and the server's
//! connection registry.

pub use client::Client;
pub use connection::{Connection, ConnectionOptions, Role};
pub use server::Server;

mod client;
mod connection;
mod server;
