use std::io::{self, BufRead, Write};

use clap::Parser;

use framelog::{setup_tracing, AppResult, Client, Message};

#[derive(Parser)]
#[command(version, about = "Console client for the framed-message relay")]
pub struct CommandLine {
    /// server host
    #[arg(default_value = "127.0.0.1")]
    pub host: String,
    /// server port
    #[arg(default_value_t = 8080)]
    pub port: u16,
}

fn main() -> AppResult<()> {
    setup_tracing()?;

    let commandline = CommandLine::parse();
    let mut client = Client::new();
    client.connect(&commandline.host, commandline.port)?;

    // the connect attempt completes on the reactor; give it a moment
    for _ in 0..20 {
        if client.is_connected() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    let stdin = io::stdin();
    let mut line = String::new();
    while client.is_connected() {
        print!("Message: ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim_end();
        if text.is_empty() {
            continue;
        }
        client.send(Message::from_text(text));
    }

    client.disconnect();
    Ok(())
}
