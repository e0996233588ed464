use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use parking_lot::Mutex;

/// Counters describing what a rotating file has done so far
#[derive(Debug)]
pub struct RotationMetrics {
    // Write path
    /// Number of successful writes
    write_count: AtomicUsize,
    /// Number of failed writes (closed sink, I/O errors, degraded sink)
    write_errors: AtomicUsize,
    /// Total bytes written across all files
    bytes_written: AtomicU64,
    /// Total time spent inside writes, in nanoseconds
    write_duration_ns: AtomicU64,

    // Rotation
    /// Rotations triggered by the size threshold
    size_rotations: AtomicUsize,
    /// Rotations triggered by the bucket timer
    time_rotations: AtomicUsize,
    /// Rotations that could not open their next file
    rotation_failures: AtomicUsize,
    /// Duration of the most recent rotation
    last_rotation_duration: Mutex<Duration>,

    // Cleanup
    /// Empty files removed on time rotation
    empty_files_removed: AtomicUsize,
    /// Empty directories removed on time rotation
    empty_dirs_removed: AtomicUsize,

    // Expiration
    /// Times the expiration callback was invoked
    expiration_runs: AtomicUsize,
    /// Files handed to the expiration callback
    expired_files_reported: AtomicUsize,
    /// Expiration callbacks that panicked
    callback_panics: AtomicUsize,

    /// Creation time of the collector
    start_time: Instant,
}

impl Default for RotationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationMetrics {
    /// Create a new, zeroed collector
    pub fn new() -> Self {
        Self {
            write_count: AtomicUsize::new(0),
            write_errors: AtomicUsize::new(0),
            bytes_written: AtomicU64::new(0),
            write_duration_ns: AtomicU64::new(0),

            size_rotations: AtomicUsize::new(0),
            time_rotations: AtomicUsize::new(0),
            rotation_failures: AtomicUsize::new(0),
            last_rotation_duration: Mutex::new(Duration::from_secs(0)),

            empty_files_removed: AtomicUsize::new(0),
            empty_dirs_removed: AtomicUsize::new(0),

            expiration_runs: AtomicUsize::new(0),
            expired_files_reported: AtomicUsize::new(0),
            callback_panics: AtomicUsize::new(0),

            start_time: Instant::now(),
        }
    }

    /// Record a successful write of `bytes` that took `duration`
    pub fn record_write(&self, bytes: usize, duration: Duration) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.write_duration_ns.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Record a failed write
    pub fn increment_write_errors(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a size rotation
    pub fn record_size_rotation(&self, duration: Duration) {
        self.size_rotations.fetch_add(1, Ordering::Relaxed);
        *self.last_rotation_duration.lock() = duration;
    }

    /// Record a time rotation
    pub fn record_time_rotation(&self, duration: Duration) {
        self.time_rotations.fetch_add(1, Ordering::Relaxed);
        *self.last_rotation_duration.lock() = duration;
    }

    /// Record a rotation that failed to open its file
    pub fn increment_rotation_failures(&self) {
        self.rotation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record removal of an empty file
    pub fn increment_empty_files_removed(&self) {
        self.empty_files_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record removal of empty directories
    pub fn add_empty_dirs_removed(&self, count: usize) {
        self.empty_dirs_removed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one invocation of the expiration callback
    pub fn record_expiration(&self, files: usize) {
        self.expiration_runs.fetch_add(1, Ordering::Relaxed);
        self.expired_files_reported.fetch_add(files, Ordering::Relaxed);
    }

    /// Record a panicking expiration callback
    pub fn increment_callback_panics(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Get number of successful writes
    pub fn get_write_count(&self) -> usize {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Get number of failed writes
    pub fn get_write_errors(&self) -> usize {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Get total bytes written
    pub fn get_bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Get cumulative write duration
    pub fn get_write_duration(&self) -> Duration {
        Duration::from_nanos(self.write_duration_ns.load(Ordering::Relaxed))
    }

    /// Get number of size rotations
    pub fn get_size_rotations(&self) -> usize {
        self.size_rotations.load(Ordering::Relaxed)
    }

    /// Get number of time rotations
    pub fn get_time_rotations(&self) -> usize {
        self.time_rotations.load(Ordering::Relaxed)
    }

    /// Get number of failed rotations
    pub fn get_rotation_failures(&self) -> usize {
        self.rotation_failures.load(Ordering::Relaxed)
    }

    /// Get duration of the most recent rotation
    pub fn get_last_rotation_duration(&self) -> Duration {
        *self.last_rotation_duration.lock()
    }

    /// Get number of removed empty files
    pub fn get_empty_files_removed(&self) -> usize {
        self.empty_files_removed.load(Ordering::Relaxed)
    }

    /// Get number of removed empty directories
    pub fn get_empty_dirs_removed(&self) -> usize {
        self.empty_dirs_removed.load(Ordering::Relaxed)
    }

    /// Get number of expiration callback invocations
    pub fn get_expiration_runs(&self) -> usize {
        self.expiration_runs.load(Ordering::Relaxed)
    }

    /// Get number of files reported as expired
    pub fn get_expired_files_reported(&self) -> usize {
        self.expired_files_reported.load(Ordering::Relaxed)
    }

    /// Get number of panicking expiration callbacks
    pub fn get_callback_panics(&self) -> usize {
        self.callback_panics.load(Ordering::Relaxed)
    }

    /// Get uptime of the collector
    pub fn get_uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.write_count.store(0, Ordering::Relaxed);
        self.write_errors.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.write_duration_ns.store(0, Ordering::Relaxed);

        self.size_rotations.store(0, Ordering::Relaxed);
        self.time_rotations.store(0, Ordering::Relaxed);
        self.rotation_failures.store(0, Ordering::Relaxed);
        *self.last_rotation_duration.lock() = Duration::from_secs(0);

        self.empty_files_removed.store(0, Ordering::Relaxed);
        self.empty_dirs_removed.store(0, Ordering::Relaxed);

        self.expiration_runs.store(0, Ordering::Relaxed);
        self.expired_files_reported.store(0, Ordering::Relaxed);
        self.callback_panics.store(0, Ordering::Relaxed);
    }

    /// Get a formatted report of all metrics
    pub fn get_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Rotation Metrics ===\n\n");

        report.push_str("Writes:\n");
        report.push_str(&format!("  Writes: {}\n", self.get_write_count()));
        report.push_str(&format!("  Write Errors: {}\n", self.get_write_errors()));
        report.push_str(&format!("  Bytes Written: {}\n", self.get_bytes_written()));
        report.push_str(&format!("  Write Time: {:?}\n", self.get_write_duration()));

        report.push_str("\nRotations:\n");
        report.push_str(&format!("  Size Rotations: {}\n", self.get_size_rotations()));
        report.push_str(&format!("  Time Rotations: {}\n", self.get_time_rotations()));
        report.push_str(&format!("  Failures: {}\n", self.get_rotation_failures()));
        report.push_str(&format!("  Last Rotation: {:?}\n", self.get_last_rotation_duration()));

        report.push_str("\nCleanup:\n");
        report.push_str(&format!("  Empty Files Removed: {}\n", self.get_empty_files_removed()));
        report.push_str(&format!("  Empty Dirs Removed: {}\n", self.get_empty_dirs_removed()));

        report.push_str("\nExpiration:\n");
        report.push_str(&format!("  Runs: {}\n", self.get_expiration_runs()));
        report.push_str(&format!("  Files Reported: {}\n", self.get_expired_files_reported()));
        report.push_str(&format!("  Callback Panics: {}\n", self.get_callback_panics()));

        report.push_str(&format!("\nUptime: {:?}\n", self.get_uptime()));

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_write_recording() {
        let metrics = RotationMetrics::new();

        metrics.record_write(10, Duration::from_millis(1));
        metrics.record_write(5, Duration::from_millis(2));
        metrics.increment_write_errors();

        assert_eq!(metrics.get_write_count(), 2);
        assert_eq!(metrics.get_bytes_written(), 15);
        assert_eq!(metrics.get_write_errors(), 1);
        assert_eq!(metrics.get_write_duration(), Duration::from_millis(3));
    }

    #[test]
    fn test_metrics_rotation_recording() {
        let metrics = RotationMetrics::new();

        metrics.record_size_rotation(Duration::from_millis(4));
        metrics.record_time_rotation(Duration::from_millis(7));
        metrics.increment_rotation_failures();
        metrics.increment_empty_files_removed();
        metrics.add_empty_dirs_removed(3);

        assert_eq!(metrics.get_size_rotations(), 1);
        assert_eq!(metrics.get_time_rotations(), 1);
        assert_eq!(metrics.get_rotation_failures(), 1);
        assert_eq!(metrics.get_last_rotation_duration(), Duration::from_millis(7));
        assert_eq!(metrics.get_empty_files_removed(), 1);
        assert_eq!(metrics.get_empty_dirs_removed(), 3);
    }

    #[test]
    fn test_metrics_expiration_recording() {
        let metrics = RotationMetrics::new();

        metrics.record_expiration(2);
        metrics.record_expiration(0);
        metrics.increment_callback_panics();

        assert_eq!(metrics.get_expiration_runs(), 2);
        assert_eq!(metrics.get_expired_files_reported(), 2);
        assert_eq!(metrics.get_callback_panics(), 1);
    }

    #[test]
    fn test_metrics_report_and_reset() {
        let metrics = RotationMetrics::new();
        metrics.record_write(100, Duration::from_millis(1));
        metrics.record_size_rotation(Duration::from_millis(1));

        let report = metrics.get_report();
        assert!(report.contains("Bytes Written: 100"));
        assert!(report.contains("Size Rotations: 1"));
        assert!(report.contains("Callback Panics: 0"));

        metrics.reset();
        assert_eq!(metrics.get_write_count(), 0);
        assert_eq!(metrics.get_bytes_written(), 0);
        assert_eq!(metrics.get_size_rotations(), 0);
        assert_eq!(metrics.get_last_rotation_duration(), Duration::from_secs(0));
    }

    #[test]
    fn test_metrics_thread_safety() {
        let metrics = Arc::new(RotationMetrics::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    metrics.record_write(1, Duration::from_nanos(1));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.get_write_count(), 8000);
        assert_eq!(metrics.get_bytes_written(), 8000);
    }
}
