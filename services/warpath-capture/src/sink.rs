//! Frame persistence

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::frame::CapturedFrame;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing frames to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for decoded frames
pub trait FrameSink {
    fn save(&mut self, frame: &CapturedFrame) -> Result<(), SinkError>;
}

/// Appends one JSON object per line, flushed after every frame
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it if needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;
        info!("Writing frames to {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FrameSink for JsonLinesSink {
    fn save(&mut self, frame: &CapturedFrame) -> Result<(), SinkError> {
        let line = serde_json::to_string(frame)?;
        writeln!(self.writer, "{}", line).map_err(|e| self.io_error(e))?;
        self.writer.flush().map_err(|e| self.io_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("warpath-{}-{}.jsonl", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn frame(frame_type: &str, source: u64) -> CapturedFrame {
        CapturedFrame {
            frame_type: frame_type.to_string(),
            timestamp: 1_700_000_000,
            source,
            data: vec![0x80, 0x00],
            ..Default::default()
        }
    }

    #[test]
    fn test_writes_one_line_per_frame() {
        let path = temp_path("lines");
        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.save(&frame("beacon", 1)).unwrap();
        sink.save(&frame("probe-req", 2)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "beacon");
        assert_eq!(lines[0]["data"], "8000");
        assert_eq!(lines[1]["type"], "probe-req");
        assert_eq!(lines[1]["source"], 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reopen_appends() {
        let path = temp_path("append");
        JsonLinesSink::create(&path).unwrap().save(&frame("beacon", 1)).unwrap();
        JsonLinesSink::create(&path).unwrap().save(&frame("beacon", 2)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join("warpath-missing-dir")
            .join("nested")
            .join("frames.jsonl");
        assert!(matches!(
            JsonLinesSink::create(&path),
            Err(SinkError::Io { .. })
        ));
    }
}
