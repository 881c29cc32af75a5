use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::info;

use crate::message::OwnedMessage;
use crate::service::{AppResult, SinkConfig};

/// Appends message text to per-sender files, rotating by size.
///
/// Each sender gets a directory named after its connection id. A message is
/// appended to the most recently modified file that still has room under
/// `max_file_size`; when none qualifies a new timestamped file is started.
/// Runs on the application drain thread, so plain blocking I/O throughout.
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
    max_file_size: u64,
    file_prefix: String,
}

impl FileSink {
    pub fn new(config: &SinkConfig) -> FileSink {
        FileSink {
            output_dir: PathBuf::from(&config.output_dir),
            max_file_size: config.max_file_size,
            file_prefix: config.file_prefix.clone(),
        }
    }

    /// Appends one message as a line to the sender's current file.
    pub fn append(&self, owned: &OwnedMessage) -> AppResult<()> {
        let text = owned.message.text();
        let sender = owned
            .sender_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "local".to_string());

        let dir = self.output_dir.join(&sender);
        fs::create_dir_all(&dir)?;

        let line_len = text.len() as u64 + 1;
        let path = match self.pick_open_file(&dir, line_len)? {
            Some(existing) => existing,
            None => self.fresh_file_path(&dir),
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", text)?;

        info!("[{}] new message: {}", sender, text);
        Ok(())
    }

    /// A new timestamped file name, disambiguated when several rotations
    /// land within the same second.
    fn fresh_file_path(&self, dir: &Path) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let path = dir.join(format!("{}_{}.txt", self.file_prefix, stamp));
        if !path.exists() {
            return path;
        }
        let mut index = 1;
        loop {
            let path = dir.join(format!("{}_{}_{}.txt", self.file_prefix, stamp, index));
            if !path.exists() {
                return path;
            }
            index += 1;
        }
    }

    /// The most recently modified regular file in `dir` that can still take
    /// `incoming` bytes without passing the size cap, if any.
    fn pick_open_file(&self, dir: &Path, incoming: u64) -> AppResult<Option<PathBuf>> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            if metadata.len() + incoming > self.max_file_size {
                continue;
            }
            let modified = metadata.modified()?;
            if newest.as_ref().map(|(at, _)| modified > *at).unwrap_or(true) {
                newest = Some((modified, entry.path()));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

#[cfg(test)]
mod tests {
    use crate::message::Message;
    use crate::message::OwnedMessage;

    use super::*;

    fn sink_in(dir: &std::path::Path, max_file_size: u64) -> FileSink {
        FileSink::new(&SinkConfig {
            output_dir: dir.to_string_lossy().into_owned(),
            max_file_size,
            file_prefix: "log".to_string(),
        })
    }

    fn message(text: &str) -> OwnedMessage {
        OwnedMessage::new(None, Message::from_text(text))
    }

    fn files_in(dir: &std::path::Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_appends_lines_to_one_file_under_cap() -> AppResult<()> {
        let dir = tempfile::tempdir()?;
        let sink = sink_in(dir.path(), 1024);

        sink.append(&message("first"))?;
        sink.append(&message("second"))?;

        let sender_dir = dir.path().join("local");
        let files = files_in(&sender_dir);
        assert_eq!(files.len(), 1);
        assert_eq!(fs::read_to_string(&files[0])?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn test_rotates_once_file_would_exceed_cap() -> AppResult<()> {
        let dir = tempfile::tempdir()?;
        // room for one short line only
        let sink = sink_in(dir.path(), 8);

        sink.append(&message("0123456"))?;
        sink.append(&message("next"))?;

        let sender_dir = dir.path().join("local");
        assert_eq!(files_in(&sender_dir).len(), 2);
        Ok(())
    }

    #[test]
    fn test_refills_most_recent_file_with_room() -> AppResult<()> {
        let dir = tempfile::tempdir()?;
        let sink = sink_in(dir.path(), 64);
        let sender_dir = dir.path().join("local");

        // a full file and a fresh one
        fs::create_dir_all(&sender_dir)?;
        fs::write(sender_dir.join("log_20250101000000.txt"), vec![b'x'; 64])?;
        fs::write(sender_dir.join("log_20250101000001.txt"), b"open\n")?;

        sink.append(&message("more"))?;

        assert_eq!(
            fs::read_to_string(sender_dir.join("log_20250101000001.txt"))?,
            "open\nmore\n"
        );
        assert_eq!(files_in(&sender_dir).len(), 2);
        Ok(())
    }
}
