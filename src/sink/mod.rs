//! Consumers of decoded messages. The protocol core hands messages over as
//! [`OwnedMessage`](crate::message::OwnedMessage)s and any handler can take
//! the sink's place without touching the protocol layer.

pub use file_sink::FileSink;

mod file_sink;
