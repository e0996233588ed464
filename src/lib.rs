//! # rotate_rs
//!
//! An append-only file sink that rotates across files by wall-clock time
//! buckets and by size, and reports files that fell out of a retention
//! window to a caller-supplied handler.
//!
//! Files are named `{directory}/{layout(bucket)}[{index}]{extension}`. The
//! live file of a bucket carries no index; size rotation moves it to `[1]`
//! and continues in `[2]`, `[3]` and so on.
//!
//! ```no_run
//! use rotate_rs::{RotateConfig, RotatingFile, MB, WEEK};
//!
//! # fn main() -> rotate_rs::Result<()> {
//! let config = RotateConfig::new("/var/log/app", "%Y/%m/%d", ".log")
//!     .with_max_size(64 * MB)
//!     .with_max_age(WEEK)
//!     .with_expired_handler(|files| {
//!         for file in files {
//!             let _ = std::fs::remove_file(file);
//!         }
//!     });
//!
//! let sink = RotatingFile::with_config(config)?;
//! sink.write(b"hello\n")?;
//! sink.close()?;
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod clock;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod expire;
pub mod metrics;
pub mod scan;

pub use bucket::Zone;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::FilenameCodec;
pub use config::{ExpiredHandler, FailurePolicy, RotateConfig, DAY, GB, KB, MB, MONTH, WEEK};
pub use engine::{Health, RotatingFile};
pub use error::{Error, Result};
pub use metrics::RotationMetrics;
