use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use framelog::{setup_file_tracing, AppResult, FileSink, Server, ServerConfig};

#[derive(Parser)]
#[command(version, about = "Framed-message relay server")]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// directory for the server's own log files
    #[arg(long, default_value = "logs")]
    pub log_dir: String,
}

fn main() -> AppResult<()> {
    let commandline = CommandLine::parse();
    let _log_guard = setup_file_tracing(&commandline.log_dir)?;

    let config = match &commandline.conf {
        Some(path) => ServerConfig::set_up_config(PathBuf::from(path))?,
        None => ServerConfig::default(),
    };
    std::fs::create_dir_all(&config.sink.output_dir)?;
    let sink = FileSink::new(&config.sink);

    let mut server = Server::new(config);
    server.start()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("shutdown requested");
            running.store(false, Ordering::Release);
        })
        .map_err(|e| framelog::AppError::IllegalState(e.to_string()))?;
    }

    while running.load(Ordering::Acquire) {
        server.run(|owned| {
            if let Err(e) = sink.append(&owned) {
                error!("failed to write message to sink: {}", e);
            }
        });
    }

    server.stop();
    Ok(())
}
