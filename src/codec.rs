//! Filename codec
//!
//! Maps a `(bucket, index)` pair to a path below the root directory and
//! back. The on-disk shape is
//! `{directory}/{layout(bucket)}[{left}{index}{right}]{extension}` where the
//! bracketed index is omitted for index 0. The layout may contain path
//! separators, in which case buckets live in nested directories.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::format::{self, Item, Parsed, StrftimeItems};
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};

use crate::config::RotateConfig;
use crate::error::{Error, Result};

/// Encodes and decodes rotated filenames for one root directory
#[derive(Debug, Clone)]
pub struct FilenameCodec {
    directory: PathBuf,
    layout: String,
    extension: String,
    left: char,
    right: char,
}

impl FilenameCodec {
    /// Create a codec, rejecting layouts that cannot be parsed back
    pub fn new(
        directory: impl Into<PathBuf>,
        layout: impl Into<String>,
        extension: impl Into<String>,
        left: char,
        right: char,
    ) -> Result<Self> {
        let codec = Self {
            directory: directory.into(),
            layout: layout.into(),
            extension: extension.into(),
            left,
            right,
        };

        if StrftimeItems::new(&codec.layout).any(|item| matches!(item, Item::Error)) {
            return Err(Error::config(format!("Invalid time layout: {}", codec.layout)));
        }

        if codec.layout.starts_with(std::path::is_separator) {
            return Err(Error::config(format!(
                "Time layout must be relative to the directory: {}", codec.layout
            )));
        }

        codec.check_round_trip(reference_bucket()?)?;
        Ok(codec)
    }

    /// Reject layouts too coarse to tell consecutive buckets of `interval`
    /// apart, checked at a fixed reference time and at `current`.
    pub fn check_interval(&self, interval: Duration, current: NaiveDateTime) -> Result<()> {
        let step = ChronoDuration::from_std(interval)
            .map_err(|e| Error::config(format!("Rotation interval out of range: {}", e)))?;
        let next = reference_bucket()?
            .checked_add_signed(step)
            .ok_or_else(|| Error::config("Rotation interval out of range"))?;

        for bucket in [next, current] {
            self.check_round_trip(bucket).map_err(|_| {
                Error::config(format!(
                    "Time layout {} cannot distinguish buckets {:?} apart (fails at {})",
                    self.layout, interval, bucket
                ))
            })?;
        }
        Ok(())
    }

    fn check_round_trip(&self, bucket: NaiveDateTime) -> Result<()> {
        if self.decode(&self.encode(bucket, 0)) != Some((bucket, 0)) {
            return Err(Error::config(format!(
                "Time layout does not parse back to the time it formats: {}", self.layout
            )));
        }
        Ok(())
    }

    /// Build the codec described by a configuration
    pub fn from_config(config: &RotateConfig) -> Result<Self> {
        Self::new(
            config.directory.clone(),
            config.time_layout.clone(),
            config.normalized_extension(),
            config.left_delimiter,
            config.right_delimiter,
        )
    }

    /// Root directory every encoded path lives under
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Extension appended to every encoded path
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path for `bucket` with sequence `index` (0 means no suffix)
    pub fn encode(&self, bucket: NaiveDateTime, index: u64) -> PathBuf {
        let mut name = bucket.format(&self.layout).to_string();
        if index >= 1 {
            name.push(self.left);
            name.push_str(&index.to_string());
            name.push(self.right);
        }
        name.push_str(&self.extension);
        self.directory.join(name)
    }

    /// Recover `(bucket, index)` from a path produced by [`encode`](Self::encode).
    ///
    /// Returns `None` for anything that is not exactly such a path: foreign
    /// files, a missing or wrong extension, unbalanced delimiters, a non
    /// numeric or zero index, or a body that does not match the layout.
    pub fn decode(&self, path: &Path) -> Option<(NaiveDateTime, u64)> {
        let relative = relative_name(path.strip_prefix(&self.directory).ok()?)?;
        let body = relative.strip_suffix(self.extension.as_str())?;

        if let Some(head) = body.strip_suffix(self.right) {
            let left_at = head.rfind(self.left)?;
            let digits = &head[left_at + self.left.len_utf8()..];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let index: u64 = digits.parse().ok()?;
            if index == 0 {
                return None;
            }
            Some((self.parse_bucket(&head[..left_at])?, index))
        } else {
            Some((self.parse_bucket(body)?, 0))
        }
    }

    /// Highest index among `files` that belong to `bucket`
    pub fn highest_index<'a, I>(&self, bucket: NaiveDateTime, files: I) -> Option<(u64, PathBuf)>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        files
            .into_iter()
            .filter_map(|path| match self.decode(path) {
                Some((t, index)) if t == bucket => Some((index, path.clone())),
                _ => None,
            })
            .max_by_key(|(index, _)| *index)
    }

    fn parse_bucket(&self, text: &str) -> Option<NaiveDateTime> {
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, text, StrftimeItems::new(&self.layout)).ok()?;

        // Fields the layout already fixed keep their parsed value; the
        // setters only fill what is missing.
        let date = match parsed.to_naive_date() {
            Ok(date) => date,
            Err(_) => {
                let mut filled = parsed.clone();
                let _ = filled.set_month(1);
                let _ = filled.set_day(1);
                filled.to_naive_date().ok()?
            }
        };
        let time = match parsed.to_naive_time() {
            Ok(time) => time,
            Err(_) => {
                let mut filled = parsed.clone();
                let _ = filled.set_hour(0);
                let _ = filled.set_minute(0);
                let _ = filled.set_second(0);
                filled.to_naive_time().ok()?
            }
        };
        let bucket = NaiveDateTime::new(date, time);

        // Only the canonical spelling decodes, keeping encode/decode a bijection
        if bucket.format(&self.layout).to_string() != text {
            return None;
        }
        Some(bucket)
    }
}

fn reference_bucket() -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::timestamp("Cannot build reference bucket"))
}

fn relative_name(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
