//! Rotation engine
//!
//! [`RotatingFile`] owns the single open file of a rotating sink. Writers
//! append through a shared lock; size rotation runs on the writer's stack
//! when the threshold is crossed; time rotation and expiration run on a
//! background thread that wakes at every bucket boundary.

mod worker;


use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, NaiveDateTime, Utc};
use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::bucket;
use crate::clock::{Clock, SystemClock};
use crate::codec::FilenameCodec;
use crate::config::{FailurePolicy, RotateConfig};
use crate::error::{Error, Result};
use crate::expire::Expiration;
use crate::metrics::RotationMetrics;
use crate::scan;

/// Observable condition of a rotating file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// A file is open and accepting writes
    Open,
    /// A rotation could not open its next file; writes are rejected
    Failed(String),
    /// The sink was closed
    Closed,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Open => write!(f, "open"),
            Health::Failed(reason) => write!(f, "failed: {}", reason),
            Health::Closed => write!(f, "closed"),
        }
    }
}

/// The file currently receiving writes
struct ActiveFile {
    file: File,
    path: PathBuf,
    /// Whether the name already carries a bracketed index
    suffixed: bool,
}

/// Everything a swap has to replace together
struct State {
    current: Option<ActiveFile>,
    /// Bytes written to `current` since it was opened or resumed.
    /// Updated while the shared lock is held, so a swap never lands
    /// between a write and its accounting.
    written: AtomicU64,
    /// Index the current file carries once retired; the next size
    /// rotation opens `index + 1`
    index: u64,
    /// Bucket of the current file
    bucket: NaiveDateTime,
    closed: bool,
    failure: Option<String>,
}

impl State {
    fn unavailable(&self) -> Error {
        match &self.failure {
            Some(reason) if !self.closed => Error::rotation_failed(reason.clone()),
            _ => Error::Closed,
        }
    }
}

pub(crate) struct Shared {
    config: RotateConfig,
    codec: FilenameCodec,
    expiration: Expiration,
    clock: Arc<dyn Clock>,
    state: RwLock<State>,
    /// Serialises size and time rotations with each other and with close
    rotation: Mutex<()>,
    metrics: RotationMetrics,
}

/// Append-only sink that rotates across files by time and size
pub struct RotatingFile {
    shared: Arc<Shared>,
    timer: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFile")
            .field("directory", &self.shared.config.directory)
            .field("current", &self.current_path())
            .field("health", &self.health())
            .finish()
    }
}

impl RotatingFile {
    /// Create a rotating file with default options
    pub fn new<P: AsRef<Path>>(directory: P, time_layout: &str, extension: &str) -> Result<Self> {
        Self::with_config(RotateConfig::new(directory, time_layout, extension))
    }

    /// Create a rotating file from a configuration
    pub fn with_config(config: RotateConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a rotating file whose buckets follow `clock`
    pub fn with_clock(config: RotateConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        create_dirs(&config.directory, config.dir_mode).map_err(|e| {
            Error::config(format!(
                "Failed to create directory {}: {}", config.directory.display(), e
            ))
        })?;

        let codec = FilenameCodec::from_config(&config)?;
        let expiration = Expiration::new(config.max_age, config.expired_handler.clone());
        let bucket = bucket::current_bucket(clock.as_ref(), config.zone, config.rotation_interval)?;
        codec.check_interval(config.rotation_interval, bucket)?;

        let (path, index, suffixed) = locate(&codec, bucket)?;
        let file = open_append(&path, &config)?;
        let resumed = file.metadata()?.len();
        if resumed > 0 {
            info!(path = %path.display(), bytes = resumed, index, "resuming existing file");
        } else {
            debug!(path = %path.display(), "opened file");
        }

        let shared = Arc::new(Shared {
            state: RwLock::new(State {
                current: Some(ActiveFile { file, path, suffixed }),
                written: AtomicU64::new(resumed),
                index,
                bucket,
                closed: false,
                failure: None,
            }),
            rotation: Mutex::new(()),
            metrics: RotationMetrics::new(),
            config,
            codec,
            expiration,
            clock,
        });

        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("rotate-timer".to_string())
            .spawn(move || worker::run(worker_shared, shutdown_rx))?;

        if shared.over_threshold() {
            shared.rotate_by_size();
        }
        shared.run_expiration();

        Ok(Self {
            shared,
            timer: Mutex::new(Some((shutdown_tx, handle))),
        })
    }

    /// Append `data` to the current file.
    ///
    /// Returns the number of bytes written. May rotate to a new file before
    /// returning when the size threshold is crossed.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let shared = &self.shared;
        let start = Instant::now();

        let crossed = {
            let state = shared.state.read();
            let active = match &state.current {
                Some(active) => active,
                None => {
                    shared.metrics.increment_write_errors();
                    return Err(state.unavailable());
                }
            };

            if let Err(e) = (&active.file).write_all(data) {
                shared.metrics.increment_write_errors();
                return Err(e.into());
            }

            let total = state.written.fetch_add(data.len() as u64, Ordering::SeqCst) + data.len() as u64;
            shared.config.size_rotation_enabled() && total >= shared.config.max_size
        };

        shared.metrics.record_write(data.len(), start.elapsed());

        if crossed {
            shared.rotate_by_size();
        }

        Ok(data.len())
    }

    /// Flush written data of the current file to disk
    pub fn flush(&self) -> Result<()> {
        let state = self.shared.state.read();
        match &state.current {
            Some(active) => Ok(active.file.sync_data()?),
            None => Err(state.unavailable()),
        }
    }

    /// Stop the timer, then flush and close the current file.
    ///
    /// Every later write fails. Closing a second time returns
    /// [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        let (shutdown, handle) = self.timer.lock().take().ok_or(Error::Closed)?;
        drop(shutdown);
        if handle.join().is_err() {
            error!("rotation timer thread panicked");
        }

        let retired = {
            let _rotation = self.shared.rotation.lock();
            let mut state = self.shared.state.write();
            state.closed = true;
            state.current.take()
        };

        if let Some(active) = retired {
            active.file.sync_all()?;
            info!(path = %active.path.display(), "closed rotating file");
        }
        Ok(())
    }

    /// Current health of the sink
    pub fn health(&self) -> Health {
        let state = self.shared.state.read();
        if state.closed {
            Health::Closed
        } else if let Some(reason) = &state.failure {
            Health::Failed(reason.clone())
        } else {
            Health::Open
        }
    }

    /// Path of the file currently receiving writes
    pub fn current_path(&self) -> Option<PathBuf> {
        self.shared.state.read().current.as_ref().map(|a| a.path.clone())
    }

    /// Bookkeeping index: the index the current file carries once retired
    pub fn sequence_index(&self) -> u64 {
        self.shared.state.read().index
    }

    /// Bytes written to the current file since it was opened
    pub fn written_bytes(&self) -> u64 {
        self.shared.state.read().written.load(Ordering::SeqCst)
    }

    /// Bucket the current file belongs to
    pub fn current_bucket(&self) -> NaiveDateTime {
        self.shared.state.read().bucket
    }

    /// Configuration the sink was built from
    pub fn config(&self) -> &RotateConfig {
        &self.shared.config
    }

    /// Codec naming the sink's files
    pub fn codec(&self) -> &FilenameCodec {
        &self.shared.codec
    }

    /// Counters describing the sink's activity
    pub fn metrics(&self) -> &RotationMetrics {
        &self.shared.metrics
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

impl Shared {
    fn over_threshold(&self) -> bool {
        self.config.size_rotation_enabled()
            && self.state.read().written.load(Ordering::SeqCst) >= self.config.max_size
    }

    /// Move to the next index of the current bucket.
    ///
    /// Re-checks the threshold under the rotation lock so writers that
    /// crossed it together rotate once.
    pub(crate) fn rotate_by_size(&self) {
        let _rotation = self.rotation.lock();
        let start = Instant::now();

        let (bucket, next) = {
            let state = self.state.read();
            if state.current.is_none() || state.written.load(Ordering::SeqCst) < self.config.max_size {
                return;
            }
            (state.bucket, state.index + 1)
        };

        let path = self.codec.encode(bucket, next);
        let file = match open_append(&path, &self.config) {
            Ok(file) => file,
            Err(e) => return self.rotation_failed(&path, e, None),
        };

        let retired = {
            let mut state = self.state.write();
            let retired = state.current.replace(ActiveFile {
                file,
                path: path.clone(),
                suffixed: true,
            });
            state.written.store(0, Ordering::SeqCst);
            state.index = next;
            retired
        };

        if let Some(retired) = retired {
            // The unsuffixed name is reserved for a bucket's live base file
            let rename_to = (!retired.suffixed).then(|| self.codec.encode(bucket, 1));
            let (old_path, _) = retire(retired);
            if let Some(target) = rename_to {
                if target.exists() {
                    warn!(from = %old_path.display(), to = %target.display(), "index 1 already taken, base file left in place");
                } else if let Err(e) = fs::rename(&old_path, &target) {
                    warn!(from = %old_path.display(), to = %target.display(), error = %e, "failed to rename base file");
                }
            }
        }

        self.metrics.record_size_rotation(start.elapsed());
        info!(path = %path.display(), index = next, "rotated by size");
    }

    /// Move to the base file of the bucket containing `now`.
    ///
    /// Returns `false` when the bucket has not advanced or the sink is closed.
    pub(crate) fn rotate_by_time(&self, now: DateTime<Utc>) -> bool {
        let _rotation = self.rotation.lock();
        let start = Instant::now();

        let bucket = match bucket::bucket_start(self.config.zone.wall_clock(now), self.config.rotation_interval) {
            Ok(bucket) => bucket,
            Err(e) => {
                error!(error = %e, "cannot compute bucket for time rotation");
                return false;
            }
        };

        {
            let state = self.state.read();
            if state.closed || state.bucket == bucket {
                return false;
            }
        }

        // A bucket can be re-entered when the clock steps back
        let (path, index, suffixed) = match locate(&self.codec, bucket) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "cannot scan for existing files, starting base file");
                (self.codec.encode(bucket, 0), 1, false)
            }
        };
        let file = match open_append(&path, &self.config) {
            Ok(file) => file,
            Err(e) => {
                self.rotation_failed(&path, e, Some(bucket));
                return false;
            }
        };
        let existing = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat new file, counting from zero");
                0
            }
        };
        if existing > 0 {
            info!(path = %path.display(), bytes = existing, index, "re-entering existing file");
        }

        let retired = {
            let mut state = self.state.write();
            let retired = state.current.replace(ActiveFile {
                file,
                path: path.clone(),
                suffixed,
            });
            state.written.store(existing, Ordering::SeqCst);
            state.index = index;
            state.bucket = bucket;
            state.failure = None;
            retired
        };

        if let Some(retired) = retired {
            let (old_path, len) = retire(retired);
            if self.config.delete_empty_file && len == Some(0) && old_path != path {
                match fs::remove_file(&old_path) {
                    Ok(()) => {
                        self.metrics.increment_empty_files_removed();
                        debug!(path = %old_path.display(), "removed empty file");
                    }
                    Err(e) => warn!(path = %old_path.display(), error = %e, "failed to remove empty file"),
                }
            }
        }

        if self.config.delete_empty_dir {
            match scan::remove_empty_directories(self.codec.directory()) {
                Ok(removed) => self.metrics.add_empty_dirs_removed(removed),
                Err(e) => warn!(error = %e, "empty directory sweep failed"),
            }
        }

        self.metrics.record_time_rotation(start.elapsed());
        info!(path = %path.display(), bucket = %bucket, "rotated by time");
        true
    }

    /// Report files that fell out of the retention window
    pub(crate) fn run_expiration(&self) -> Option<usize> {
        if !self.expiration.is_enabled() {
            return None;
        }
        let bucket = self.state.read().bucket;
        match self.expiration.cutoff(bucket) {
            Ok(cutoff) => self.expiration.handle_expired(&self.codec, cutoff, &self.metrics),
            Err(e) => {
                warn!(error = %e, "skipping expiration run");
                None
            }
        }
    }

    fn rotation_failed(&self, path: &Path, err: io::Error, bucket: Option<NaiveDateTime>) {
        self.metrics.increment_rotation_failures();
        error!(path = %path.display(), error = %err, policy = %self.config.failure_policy, "rotation cannot open its next file");

        match self.config.failure_policy {
            FailurePolicy::Abort => std::process::abort(),
            FailurePolicy::Degrade => {
                let retired = {
                    let mut state = self.state.write();
                    state.failure = Some(format!("cannot open {}: {}", path.display(), err));
                    if let Some(bucket) = bucket {
                        // Retry at the next boundary rather than immediately
                        state.bucket = bucket;
                    }
                    state.current.take()
                };
                if let Some(retired) = retired {
                    retire(retired);
                }
            }
        }
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        if self.timer.get_mut().is_some() {
            if let Err(e) = self.close() {
                error!(error = %e, "error closing rotating file");
            }
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFile::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        RotatingFile::flush(self).map_err(Into::into)
    }
}

impl Write for &RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFile::write(*self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        RotatingFile::flush(*self).map_err(Into::into)
    }
}

/// File a bucket should continue in, with its bookkeeping index and
/// whether its name is suffixed. The newest existing file wins; otherwise
/// the base file is started.
fn locate(codec: &FilenameCodec, bucket: NaiveDateTime) -> Result<(PathBuf, u64, bool)> {
    let files = scan::list_all_files(codec.directory())?;
    Ok(match codec.highest_index(bucket, &files) {
        None => (codec.encode(bucket, 0), 1, false),
        Some((0, path)) => (path, 1, false),
        Some((highest, path)) => (path, highest, true),
    })
}

/// Sync and close a retired file, returning its path and final length
fn retire(active: ActiveFile) -> (PathBuf, Option<u64>) {
    let len = active.file.metadata().map(|m| m.len()).ok();
    if let Err(e) = active.file.sync_all() {
        warn!(path = %active.path.display(), error = %e, "failed to sync retired file");
    }
    drop(active.file);
    (active.path, len)
}

fn create_dirs(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

fn open_append(path: &Path, config: &RotateConfig) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        create_dirs(parent, config.dir_mode)?;
    }
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(config.file_mode);
    }
    options.open(path)
}
