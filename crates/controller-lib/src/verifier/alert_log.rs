//! Append-only alert log
//!
//! One JSON record per verification, one record per line.

use super::Alert;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Durable sink for verifier alerts
pub trait AlertLog: Send + Sync {
    /// Append one alert record
    fn append(&self, alert: &Alert) -> std::io::Result<()>;
}

/// JSON-lines file opened in append mode for every record
#[derive(Debug, Clone)]
pub struct FileAlertLog {
    path: PathBuf,
}

impl FileAlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertLog for FileAlertLog {
    fn append(&self, alert: &Alert) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(alert)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// In-process alert log
#[derive(Debug, Default)]
pub struct MemoryAlertLog {
    records: RwLock<Vec<Alert>>,
}

impl MemoryAlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every alert appended so far
    pub fn records(&self) -> Vec<Alert> {
        self.records
            .read()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertLog for MemoryAlertLog {
    fn append(&self, alert: &Alert) -> std::io::Result<()> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::AlertLevel;

    #[test]
    fn test_file_log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("alerts.log");
        let log = FileAlertLog::new(&path);

        log.append(&Alert::ok()).unwrap();
        log.append(&Alert::critical(&["GPU_A".to_string()])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"level":"OK","message":"All clusters stable"}"#);

        let second: Alert = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.level, AlertLevel::Critical);
    }

    #[test]
    fn test_file_log_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened for appending
        let log = FileAlertLog::new(dir.path());
        assert!(log.append(&Alert::ok()).is_err());
    }

    #[test]
    fn test_memory_log_keeps_order() {
        let log = MemoryAlertLog::new();
        log.append(&Alert::ok()).unwrap();
        log.append(&Alert::critical(&["CPU_B".to_string()])).unwrap();

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, AlertLevel::Ok);
        assert_eq!(records[1].level, AlertLevel::Critical);
    }
}
