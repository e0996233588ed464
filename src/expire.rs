//! Expiration reporting
//!
//! Finds files whose bucket time fell out of the retention window and hands
//! them to the configured callback. Nothing is deleted here; what happens to
//! expired files is entirely the callback's business.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use tracing::{debug, error, warn};

use crate::codec::FilenameCodec;
use crate::config::ExpiredHandler;
use crate::error::{Error, Result};
use crate::metrics::RotationMetrics;
use crate::scan;

/// Every decodable file below the codec's root whose bucket is at or before
/// `cutoff`, sorted by path.
pub fn collect_expired(codec: &FilenameCodec, cutoff: NaiveDateTime) -> Result<Vec<PathBuf>> {
    let mut expired: Vec<PathBuf> = scan::list_all_files(codec.directory())?
        .into_iter()
        .filter(|path| matches!(codec.decode(path), Some((bucket, _)) if bucket <= cutoff))
        .collect();
    expired.sort();
    Ok(expired)
}

/// Retention window plus the callback that receives expired files
#[derive(Debug, Clone)]
pub struct Expiration {
    max_age: Duration,
    handler: Option<ExpiredHandler>,
}

impl Expiration {
    /// Create an expiration policy; a zero `max_age` disables it
    pub fn new(max_age: Duration, handler: Option<ExpiredHandler>) -> Self {
        Self { max_age, handler }
    }

    /// Whether a run would invoke anything
    pub fn is_enabled(&self) -> bool {
        !self.max_age.is_zero() && self.handler.is_some()
    }

    /// Retention cutoff relative to the current bucket
    pub fn cutoff(&self, bucket: NaiveDateTime) -> Result<NaiveDateTime> {
        let age = ChronoDuration::from_std(self.max_age)
            .map_err(|e| Error::timestamp(format!("Max age out of range: {}", e)))?;
        bucket
            .checked_sub_signed(age)
            .ok_or_else(|| Error::timestamp(format!("Cutoff before {} is not representable", bucket)))
    }

    /// Report files expired as of `cutoff` to the callback.
    ///
    /// Returns how many files were handed over, or `None` when nothing was
    /// invoked (disabled, failed scan, or a panicking callback). Failures are
    /// logged and never propagate.
    pub fn handle_expired(
        &self,
        codec: &FilenameCodec,
        cutoff: NaiveDateTime,
        metrics: &RotationMetrics,
    ) -> Option<usize> {
        let handler = match &self.handler {
            Some(handler) if !self.max_age.is_zero() => handler,
            _ => return None,
        };

        let files = match collect_expired(codec, cutoff) {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "skipping expiration run, scan failed");
                return None;
            }
        };

        debug!(count = files.len(), cutoff = %cutoff, "reporting expired files");
        metrics.record_expiration(files.len());

        match panic::catch_unwind(AssertUnwindSafe(|| handler.call(&files))) {
            Ok(()) => Some(files.len()),
            Err(payload) => {
                metrics.increment_callback_panics();
                error!(panic = %panic_message(payload.as_ref()), "expired file handler panicked");
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
