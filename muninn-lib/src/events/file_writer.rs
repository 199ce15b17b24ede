//! Rotating event file writer.
//!
//! Files are created with a millisecond timestamp in the name and rotated
//! once the current file reaches the configured size. Rotation is not
//! crash-atomic: a truncated trailing record in the pre-rotation file is
//! end-of-file for readers, not corruption.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::config::EventFileFormat;
use crate::error::{MuninnError, Result};

pub struct EventFileWriter {
    dir: PathBuf,
    max_size: u64,
    format: EventFileFormat,
    cur_size: u64,
    file: File,
    pub(crate) current_path: PathBuf,
}

impl EventFileWriter {
    pub fn new<P: AsRef<Path>>(dir: P, max_size: u64, format: EventFileFormat) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            MuninnError::Config(format!("cannot create event dir {}: {e}", dir.display()))
        })?;
        let (file, current_path) = Self::create_file(&dir, format)?;
        Ok(Self { dir, max_size, format, cur_size: 0, file, current_path })
    }

    fn create_file(dir: &Path, format: EventFileFormat) -> Result<(File, PathBuf)> {
        let ext = match format {
            EventFileFormat::Binary => "bin",
            EventFileFormat::Json => "json",
        };
        let stamp = Utc::now().format("%Y_%m_%d_%H_%M_%S_%3f");
        let path = dir.join(format!("event_log_{stamp}.{ext}"));
        let file = File::create(&path).map_err(|e| {
            MuninnError::Config(format!("cannot create event file {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "opened event file");
        Ok((file, path))
    }

    /// Append one record, rotating first when the current file is full.
    pub fn write(&mut self, record: &[u8]) -> std::io::Result<()> {
        if self.cur_size >= self.max_size {
            if let Ok((file, path)) = Self::create_file(&self.dir, self.format) {
                self.file = file;
                self.current_path = path;
                self.cur_size = 0;
            }
        }

        self.file.write_all(record)?;
        self.file.flush()?;
        self.cur_size += record.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}
