// src/data.rs - Per-channel signal logging to CSV
use chrono::Local;
use csv::{Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Root for session folders; defaults to the user's documents directory
    pub output_dir: Option<PathBuf>,
    /// Open a channel on first use instead of dropping unknown names
    pub auto_add: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: None,
            auto_add: false,
        }
    }
}

impl LoggingConfig {
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }
}

pub fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("Wingflap").join("Logs")))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// Folder for one run, e.g. `<root>/session_20260301_142500`.
pub fn session_dir(root: impl AsRef<Path>, session_name: Option<String>) -> PathBuf {
    let session_name = session_name.unwrap_or_else(|| {
        format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
    });
    root.as_ref().join(session_name)
}

#[derive(Debug, Serialize)]
struct SignalRecord {
    sample: u64,
    value: f64,
}

struct Channel {
    writer: Option<Writer<File>>,
    samples: u64,
}

impl Channel {
    fn open(path: &Path) -> Self {
        let opened = OpenOptions::new().create(true).append(true).open(path);
        let writer = match opened.and_then(|file| Ok((file.metadata()?.len(), file))) {
            // Header only at the top of a fresh file
            Ok((len, file)) => Some(WriterBuilder::new().has_headers(len == 0).from_writer(file)),
            Err(e) => {
                warn!("unable to start logger for {}: {}", path.display(), e);
                None
            }
        };
        Self { writer, samples: 0 }
    }

    fn write(&mut self, value: f64) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let record = SignalRecord {
            sample: self.samples,
            value,
        };
        if let Err(e) = writer.serialize(record) {
            warn!("signal log write failed, disabling channel: {}", e);
            self.writer = None;
            return;
        }
        self.samples += 1;
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

/// Append-only numeric series, one CSV file per named channel.
///
/// Never fails: a channel that cannot be written is switched off and the
/// simulation carries on.
pub struct SignalLog {
    dir: Option<PathBuf>,
    auto_add: bool,
    channels: HashMap<String, Channel>,
}

impl SignalLog {
    pub fn disabled() -> Self {
        Self {
            dir: None,
            auto_add: false,
            channels: HashMap::new(),
        }
    }

    pub fn open(dir: impl AsRef<Path>, channels: &[&str], auto_add: bool) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("unable to create log directory {}: {}", dir.display(), e);
            return Self::disabled();
        }

        let mut log = Self {
            dir: Some(dir),
            auto_add,
            channels: HashMap::new(),
        };
        for name in channels {
            log.add_channel(name, name);
        }
        log
    }

    pub fn from_config(config: &LoggingConfig, channels: &[&str]) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let dir = session_dir(config.resolved_output_dir(), None);
        Self::open(dir, channels, config.auto_add)
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Whether `name` has an open, writable file.
    pub fn is_active(&self, name: &str) -> bool {
        self.channels
            .get(name)
            .map(|c| c.writer.is_some())
            .unwrap_or(false)
    }

    pub fn log(&mut self, name: &str, value: f64) {
        if self.dir.is_none() {
            return;
        }

        if !self.channels.contains_key(name) {
            if self.auto_add {
                self.add_channel(name, &format!("auto_{}", name));
            } else {
                debug!("cannot log variable \"{}\", no logger assigned", name);
                return;
            }
        }

        if let Some(channel) = self.channels.get_mut(name) {
            channel.write(value);
        }
    }

    fn add_channel(&mut self, name: &str, file_stem: &str) {
        let Some(dir) = self.dir.as_ref() else {
            return;
        };
        let path = dir.join(format!("{}.csv", file_stem));
        self.channels.insert(name.to_string(), Channel::open(&path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("wingflap_{}", uuid::Uuid::new_v4()))
    }

    fn read_values(path: &Path) -> Vec<f64> {
        let mut reader = csv::Reader::from_path(path).expect("open log");
        reader
            .records()
            .map(|r| r.expect("record")[1].parse::<f64>().expect("value"))
            .collect()
    }

    #[test]
    fn test_disabled_log_is_noop() {
        let mut log = SignalLog::disabled();
        log.log("rAngle", 1.0);
        assert!(!log.is_enabled());
        assert!(!log.is_active("rAngle"));
    }

    #[test]
    fn test_channel_written_and_flushed_on_drop() {
        let dir = temp_dir();
        {
            let mut log = SignalLog::open(&dir, &["rAngle"], false);
            log.log("rAngle", 1.5);
            log.log("rAngle", -2.0);
            assert!(log.is_active("rAngle"));
        }

        assert_eq!(read_values(&dir.join("rAngle.csv")), vec![1.5, -2.0]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reopened_channel_appends() {
        let dir = temp_dir();
        {
            let mut log = SignalLog::open(&dir, &["rAngle"], false);
            log.log("rAngle", 1.0);
            log.log("rAngle", 2.0);
        }
        {
            let mut log = SignalLog::open(&dir, &["rAngle"], false);
            log.log("rAngle", 3.0);
        }

        assert_eq!(read_values(&dir.join("rAngle.csv")), vec![1.0, 2.0, 3.0]);
        let raw = std::fs::read_to_string(dir.join("rAngle.csv")).expect("read log");
        assert_eq!(raw.matches("sample,value").count(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unknown_channel_dropped_without_auto_add() {
        let dir = temp_dir();
        {
            let mut log = SignalLog::open(&dir, &[], false);
            log.log("mystery", 3.0);
            assert!(!log.is_active("mystery"));
        }
        assert!(!dir.join("mystery.csv").exists());
        assert!(!dir.join("auto_mystery.csv").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_auto_add_opens_prefixed_file() {
        let dir = temp_dir();
        {
            let mut log = SignalLog::open(&dir, &[], true);
            log.log("mystery", 3.0);
        }
        assert_eq!(read_values(&dir.join("auto_mystery.csv")), vec![3.0]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_config_disabled_skips_filesystem() {
        let config = LoggingConfig {
            enabled: false,
            output_dir: Some(temp_dir()),
            auto_add: false,
        };
        let log = SignalLog::from_config(&config, &["rAngle"]);
        assert!(!log.is_enabled());
        assert!(!config.resolved_output_dir().exists());
    }

    #[test]
    fn test_session_dir_uses_given_name() {
        let dir = session_dir("/tmp/root", Some("run1".to_string()));
        assert_eq!(dir, PathBuf::from("/tmp/root/run1"));
    }
}
