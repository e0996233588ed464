//! Configuration for rotate_rs
//!
//! This module provides the options a [`RotatingFile`](crate::RotatingFile)
//! is built from. The configuration is consumed at construction and is
//! immutable afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::bucket::Zone;
use crate::error::{Result, Error};

/// One kibibyte
pub const KB: u64 = 1 << 10;
/// One mebibyte
pub const MB: u64 = 1 << 20;
/// One gibibyte
pub const GB: u64 = 1 << 30;

/// One day
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);
/// Seven days
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Thirty days
pub const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// What the engine does when a rotation cannot open its next file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and abort the process
    Abort,
    /// Log the failure, close the current file and reject writes until a
    /// later time rotation succeeds
    Degrade,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Abort
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Degrade => write!(f, "degrade"),
        }
    }
}

impl FailurePolicy {
    /// Parse a failure policy from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "degrade" => Ok(Self::Degrade),
            _ => Err(Error::config(format!("Unknown failure policy: {}", s))),
        }
    }
}

/// Callback receiving the files whose bucket time fell out of the
/// retention window. Deleting, archiving or compressing them is up to the
/// callback.
#[derive(Clone)]
pub struct ExpiredHandler(Arc<dyn Fn(&[PathBuf]) + Send + Sync>);

impl ExpiredHandler {
    /// Wrap a closure as an expiration callback
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&[PathBuf]) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub(crate) fn call(&self, files: &[PathBuf]) {
        (self.0)(files)
    }
}

impl fmt::Debug for ExpiredHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExpiredHandler(..)")
    }
}

/// Configuration options for a rotating file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct RotateConfig {
    // Required
    /// Root directory; every generated file lives below it
    pub directory: PathBuf,
    /// strftime-style layout used to name (and parse back) bucket times
    pub time_layout: String,
    /// Suffix appended to every generated filename
    pub extension: String,

    // Rotation
    /// Length of one time bucket, preferably a divisor of 24 hours
    pub rotation_interval: Duration,
    /// Zone whose wall clock buckets are aligned to
    pub zone: Zone,
    /// Byte threshold per file (0 disables size rotation)
    pub max_size: u64,

    // Retention
    /// Retention window (zero disables expiration)
    pub max_age: Duration,
    /// Remove the retired file on time rotation when it is empty
    pub delete_empty_file: bool,
    /// Remove empty directories below the root on time rotation
    pub delete_empty_dir: bool,
    /// Receives expired files
    #[serde(skip)]
    pub expired_handler: Option<ExpiredHandler>,

    // Naming and permissions
    /// Opening delimiter of the sequence index suffix
    pub left_delimiter: char,
    /// Closing delimiter of the sequence index suffix
    pub right_delimiter: char,
    /// Permission bits for created files (unix only)
    pub file_mode: u32,
    /// Permission bits for created directories (unix only)
    pub dir_mode: u32,

    /// Reaction to a rotation that cannot open its next file
    pub failure_policy: FailurePolicy,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            time_layout: String::new(),
            extension: String::new(),

            rotation_interval: DAY,
            zone: Zone::Local,
            max_size: 0,

            max_age: Duration::ZERO,
            delete_empty_file: true,
            delete_empty_dir: true,
            expired_handler: None,

            left_delimiter: '[',
            right_delimiter: ']',
            file_mode: 0o644,
            dir_mode: 0o755,

            failure_policy: FailurePolicy::default(),
        }
    }
}

impl RotateConfig {
    /// Create a configuration from the three required inputs
    pub fn new<P: AsRef<Path>>(directory: P, time_layout: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            time_layout: time_layout.into(),
            extension: extension.into(),
            ..Self::default()
        }
    }

    /// Set the rotation interval
    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    /// Set the zone used for bucket alignment
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    /// Set the retention window
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the per-file byte threshold
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the expiration callback
    pub fn with_expired_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[PathBuf]) + Send + Sync + 'static,
    {
        self.expired_handler = Some(ExpiredHandler::new(handler));
        self
    }

    /// Whether to delete empty files on time rotation
    pub fn with_delete_empty_file(mut self, flag: bool) -> Self {
        self.delete_empty_file = flag;
        self
    }

    /// Whether to delete empty directories on time rotation
    pub fn with_delete_empty_dir(mut self, flag: bool) -> Self {
        self.delete_empty_dir = flag;
        self
    }

    /// Set the sequence index delimiters
    pub fn with_delimiters(mut self, left: char, right: char) -> Self {
        self.left_delimiter = left;
        self.right_delimiter = right;
        self
    }

    /// Set permission bits for created files
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Set permission bits for created directories
    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Set the rotation failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(Error::config("Directory must not be empty"));
        }

        if self.time_layout.is_empty() {
            return Err(Error::config("Time layout must not be empty"));
        }

        if self.extension.is_empty() || self.extension == "." {
            return Err(Error::config("Extension must not be empty"));
        }

        if self.extension.contains(std::path::is_separator) {
            return Err(Error::config(format!(
                "Extension must not contain a path separator: {}", self.extension
            )));
        }

        if self.rotation_interval.is_zero() {
            return Err(Error::config("Rotation interval must be greater than zero"));
        }

        if chrono::Duration::from_std(self.rotation_interval).is_err() {
            return Err(Error::config("Rotation interval is out of range"));
        }

        if chrono::Duration::from_std(self.max_age).is_err() {
            return Err(Error::config("Max age is out of range"));
        }

        if self.left_delimiter == self.right_delimiter {
            return Err(Error::config("Index delimiters must differ"));
        }

        for delimiter in [self.left_delimiter, self.right_delimiter] {
            if delimiter.is_ascii_digit() || std::path::is_separator(delimiter) || delimiter == '%' {
                return Err(Error::config(format!(
                    "Invalid index delimiter: {:?}", delimiter
                )));
            }
        }

        self.zone.validate()?;

        Ok(())
    }

    /// Extension with a guaranteed leading dot
    pub fn normalized_extension(&self) -> String {
        if self.extension.starts_with('.') {
            self.extension.clone()
        } else {
            format!(".{}", self.extension)
        }
    }

    /// Whether size based rotation is enabled
    pub fn size_rotation_enabled(&self) -> bool {
        self.max_size > 0
    }

    /// Create a human-readable string representation of the configuration
    pub fn to_string_pretty(&self) -> String {
        let mut result = String::new();

        result.push_str("=== Rotation Configuration ===\n\n");

        result.push_str("Naming:\n");
        result.push_str(&format!("  Directory: {:?}\n", self.directory));
        result.push_str(&format!("  Time Layout: {}\n", self.time_layout));
        result.push_str(&format!("  Extension: {}\n", self.normalized_extension()));
        result.push_str(&format!(
            "  Index Delimiters: {}{}\n", self.left_delimiter, self.right_delimiter
        ));

        result.push_str("\nRotation:\n");
        result.push_str(&format!("  Interval: {}s\n", self.rotation_interval.as_secs()));
        result.push_str(&format!("  Zone: {}\n", self.zone));
        if self.size_rotation_enabled() {
            result.push_str(&format!("  Max Size: {} bytes\n", self.max_size));
        } else {
            result.push_str("  Max Size: disabled\n");
        }
        result.push_str(&format!("  Failure Policy: {}\n", self.failure_policy));

        result.push_str("\nRetention:\n");
        if self.max_age.is_zero() {
            result.push_str("  Max Age: disabled\n");
        } else {
            result.push_str(&format!("  Max Age: {}s\n", self.max_age.as_secs()));
        }
        result.push_str(&format!(
            "  Expired Handler: {}\n",
            if self.expired_handler.is_some() { "set" } else { "none" }
        ));
        result.push_str(&format!("  Delete Empty Files: {}\n", self.delete_empty_file));
        result.push_str(&format!("  Delete Empty Dirs: {}\n", self.delete_empty_dir));

        result.push_str("\nPermissions:\n");
        result.push_str(&format!("  File Mode: {:o}\n", self.file_mode));
        result.push_str(&format!("  Dir Mode: {:o}\n", self.dir_mode));

        result
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize the configuration (without the callback) to JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RotateConfig {
        RotateConfig::new("logs", "%Y-%m-%d", "log")
    }

    #[test]
    fn test_default_config() {
        let config = base();

        assert_eq!(config.rotation_interval, DAY);
        assert_eq!(config.zone, Zone::Local);
        assert_eq!(config.max_age, Duration::ZERO);
        assert_eq!(config.max_size, 0);
        assert!(config.delete_empty_file);
        assert!(config.delete_empty_dir);
        assert!(config.expired_handler.is_none());
        assert_eq!(config.left_delimiter, '[');
        assert_eq!(config.right_delimiter, ']');
        assert_eq!(config.file_mode, 0o644);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);

        assert!(config.validate().is_ok());
        assert!(!config.size_rotation_enabled());
        assert!(config.expired_handler.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = base()
            .with_rotation_interval(Duration::from_secs(3600))
            .with_zone(Zone::Utc)
            .with_max_age(WEEK)
            .with_max_size(10 * MB)
            .with_expired_handler(|_files| {})
            .with_delete_empty_file(false)
            .with_delete_empty_dir(false)
            .with_delimiters('(', ')')
            .with_failure_policy(FailurePolicy::Degrade);

        assert_eq!(config.rotation_interval, Duration::from_secs(3600));
        assert_eq!(config.zone, Zone::Utc);
        assert_eq!(config.max_size, 10 * MB);
        assert_eq!(config.max_age, WEEK);
        assert!(config.expired_handler.is_some());
        assert!(!config.delete_empty_file);
        assert_eq!((config.left_delimiter, config.right_delimiter), ('(', ')'));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid_configs = vec![
            RotateConfig::new("", "%Y", "log"),
            RotateConfig::new("logs", "", "log"),
            RotateConfig::new("logs", "%Y", ""),
            RotateConfig::new("logs", "%Y", "."),
            RotateConfig::new("logs", "%Y", "a/b"),
            base().with_rotation_interval(Duration::ZERO),
            base().with_delimiters('[', '['),
            base().with_delimiters('1', ']'),
            base().with_delimiters('[', '/'),
            base().with_zone(Zone::Fixed(48 * 3600)),
        ];

        for config in invalid_configs {
            assert!(config.validate().is_err(), "{:?} should be rejected", config);
        }
    }

    #[test]
    fn test_normalized_extension() {
        assert_eq!(RotateConfig::new("d", "%Y", "log").normalized_extension(), ".log");
        assert_eq!(RotateConfig::new("d", "%Y", ".log").normalized_extension(), ".log");
    }

    #[test]
    fn test_failure_policy() {
        assert_eq!(FailurePolicy::Abort.to_string(), "abort");
        assert_eq!(FailurePolicy::from_str("Degrade").unwrap(), FailurePolicy::Degrade);
        assert!(FailurePolicy::from_str("ignore").is_err());
    }

    #[test]
    fn test_config_json() {
        let config = RotateConfig::from_json_str(
            r#"{
                "directory": "/var/log/app",
                "time_layout": "%Y/%m/%d",
                "extension": "log",
                "zone": "utc",
                "max_size": 1048576,
                "failure_policy": "degrade"
            }"#,
        )
        .unwrap();

        assert_eq!(config.directory, PathBuf::from("/var/log/app"));
        assert_eq!(config.zone, Zone::Utc);
        assert_eq!(config.max_size, MB);
        assert_eq!(config.failure_policy, FailurePolicy::Degrade);
        // Omitted fields fall back to defaults
        assert_eq!(config.rotation_interval, DAY);
        assert!(config.delete_empty_dir);

        let json = config.to_json_string().unwrap();
        let reparsed = RotateConfig::from_json_str(&json).unwrap();
        assert_eq!(reparsed.time_layout, "%Y/%m/%d");
        assert_eq!(reparsed.max_size, MB);
    }

    #[test]
    fn test_config_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotate.json");
        std::fs::write(&path, r#"{"directory":"d","time_layout":"%Y","extension":"txt"}"#).unwrap();

        let config = RotateConfig::from_json_file(&path).unwrap();
        assert_eq!(config.normalized_extension(), ".txt");

        assert!(RotateConfig::from_json_file(dir.path().join("missing.json")).is_err());
        assert!(RotateConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_config_pretty_string() {
        let pretty = base().with_max_size(KB).to_string_pretty();

        assert!(pretty.contains("Naming:"));
        assert!(pretty.contains("Rotation:"));
        assert!(pretty.contains("Retention:"));
        assert!(pretty.contains("Max Size: 1024 bytes"));
        assert!(pretty.contains("Max Age: disabled"));
        assert!(pretty.contains("File Mode: 644"));
    }
}
