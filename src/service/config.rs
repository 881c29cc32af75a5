extern crate config as _;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address for the server role.
    pub ip: String,
    pub port: u16,
    /// Idle cut-off for accepted connections, in minutes. Fractional values
    /// are allowed so sub-minute timeouts can be configured.
    pub idle_timeout_minutes: f64,
    /// Largest body a peer may declare in a header.
    pub max_frame_size: usize,
    /// Cadence of the dead-connection sweep, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            ip: "0.0.0.0".to_string(),
            port: 8080,
            idle_timeout_minutes: 1.0,
            max_frame_size: 1_048_576,
            sweep_interval_secs: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SinkConfig {
    /// Directory holding one subdirectory per sender.
    pub output_dir: String,
    /// A file is rotated once appending would push it past this size.
    pub max_file_size: u64,
    pub file_prefix: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            output_dir: "output".to_string(),
            max_file_size: 4096,
            file_prefix: "log".to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub sink: SinkConfig,
}

impl ServerConfig {
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<ServerConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()?;
        let server_config: ServerConfig = config.try_deserialize()?;
        Ok(server_config)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.network.ip, self.network.port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.network.idle_timeout_minutes * 60.0)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.network.sweep_interval_secs)
    }
}
