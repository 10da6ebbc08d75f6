//! JSONL telemetry writer with size-based rotation.
//!
//! Files are named `telemetry_<YYYYmmdd_HHMMSS>_<seq>.jsonl` so that a plain
//! name sort is also chronological.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::types::TelemetryRecord;
use crate::config::TelemetryConfig;
use crate::error::Result;

const FILE_PREFIX: &str = "telemetry_";
const FILE_SUFFIX: &str = ".jsonl";

/// Throttled, rotating JSONL writer
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    interval: Duration,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    sequence: u32,
    last_write: Option<Instant>,
}

impl TelemetryLogger {
    /// Create the log directory if needed.
    ///
    /// # Errors
    ///
    /// `Io` if the directory cannot be created.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;
        info!("Telemetry logging to {}", dir.display());

        Ok(Self {
            dir,
            interval: Duration::from_millis(config.log_interval_ms),
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            sequence: 0,
            last_write: None,
        })
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Whether a record at `now` would be written
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_write {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Append `record` unless the interval has not elapsed.
    ///
    /// Returns `Ok(false)` when throttled.
    pub fn record(&mut self, now: Instant, record: &TelemetryRecord) -> Result<bool> {
        if !self.is_due(now) {
            return Ok(false);
        }
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        self.records_in_file += 1;
        self.last_write = Some(now);
        Ok(true)
    }

    /// Flush the open file
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .dir
            .join(format!("{}{}_{:04}{}", FILE_PREFIX, stamp, self.sequence, FILE_SUFFIX));
        self.sequence = self.sequence.wrapping_add(1);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Telemetry file {}", path.display());
        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune();
        Ok(())
    }

    /// Delete the oldest files beyond the retention count
    fn prune(&self) {
        let mut files = match telemetry_files(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not list {}: {}", self.dir.display(), e);
                return;
            }
        };
        if files.len() <= self.max_files_to_keep {
            return;
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

fn telemetry_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_telemetry = path
            .file_name()
            .map(|name| {
                let name = name.to_string_lossy();
                name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX)
            })
            .unwrap_or(false);
        if is_telemetry {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::LoopState;

    fn config(dir: &Path, interval_ms: u64, per_file: usize, keep: usize) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            log_dir: dir.to_string_lossy().to_string(),
            log_interval_ms: interval_ms,
            max_records_per_file: per_file,
            max_files_to_keep: keep,
        }
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_creates_log_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested/logs");

        TelemetryLogger::new(&config(&dir, 100, 10, 3)).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_writes_one_json_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = TelemetryLogger::new(&config(dir.path(), 0, 100, 3)).unwrap();
        let now = Instant::now();

        let mut record = TelemetryRecord::now(LoopState::Ready);
        record.turn = 25;
        assert!(logger.record(now, &record).unwrap());
        assert!(logger.record(now + Duration::from_millis(1), &record).unwrap());

        let written = lines(logger.current_path().unwrap());
        assert_eq!(written.len(), 2);
        let value: serde_json::Value = serde_json::from_str(&written[0]).unwrap();
        assert_eq!(value["turn"], 25);
    }

    #[test]
    fn test_throttles_by_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = TelemetryLogger::new(&config(dir.path(), 100, 100, 3)).unwrap();
        let start = Instant::now();
        let record = TelemetryRecord::now(LoopState::Ready);

        assert!(logger.record(start, &record).unwrap());
        assert!(!logger.record(start + Duration::from_millis(50), &record).unwrap());
        assert!(logger.record(start + Duration::from_millis(100), &record).unwrap());

        assert_eq!(lines(logger.current_path().unwrap()).len(), 2);
    }

    #[test]
    fn test_rotates_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = TelemetryLogger::new(&config(dir.path(), 0, 2, 2)).unwrap();
        let start = Instant::now();
        let record = TelemetryRecord::now(LoopState::Ready);

        // 7 records at 2 per file -> 4 files created, 2 kept
        for i in 0..7 {
            logger
                .record(start + Duration::from_millis(i), &record)
                .unwrap();
        }

        let mut files = telemetry_files(dir.path()).unwrap();
        files.sort();
        assert_eq!(files.len(), 2);
        assert_eq!(files.last().map(PathBuf::as_path), logger.current_path());
        assert_eq!(lines(&files[0]).len(), 2);
        assert_eq!(lines(&files[1]).len(), 1);
    }

    #[test]
    fn test_prune_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let mut logger = TelemetryLogger::new(&config(dir.path(), 0, 1, 1)).unwrap();
        let start = Instant::now();
        let record = TelemetryRecord::now(LoopState::Ready);

        for i in 0..3 {
            logger
                .record(start + Duration::from_millis(i), &record)
                .unwrap();
        }

        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(telemetry_files(dir.path()).unwrap().len(), 1);
    }
}
