pub use app_error::{AppError, AppResult};
pub use config::{NetworkConfig, ServerConfig, SinkConfig};
pub use shutdown::Shutdown;
pub use tracing_setup::{setup_file_tracing, setup_tracing};

mod app_error;
mod config;
mod shutdown;
mod tracing_setup;
