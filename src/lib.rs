mod collections;
mod message;
mod network;
mod service;
mod sink;

pub use collections::{SharedQueue, SharedVec};
pub use message::{Header, Message, OwnedMessage};
pub use network::{Client, Connection, ConnectionOptions, Role, Server};
pub use service::{
    setup_file_tracing, setup_tracing, AppError, AppResult, NetworkConfig, ServerConfig,
    Shutdown, SinkConfig,
};
pub use sink::FileSink;
