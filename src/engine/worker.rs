use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{after, select, Receiver};
use tracing::{debug, warn};

use super::Shared;
use crate::bucket;

/// Background loop: sleep until the next bucket boundary, rotate, then
/// report expired files. Exits when the shutdown channel disconnects.
pub(super) fn run(shared: Arc<Shared>, shutdown: Receiver<()>) {
    debug!("rotation timer started");

    loop {
        let wait = shared.time_until_next_bucket();

        select! {
            recv(shutdown) -> _ => break,
            recv(after(wait)) -> _ => {
                // Wake-ups can land early; the rotation re-checks the bucket
                if shared.rotate_by_time(shared.clock.now()) {
                    shared.run_expiration();
                }
            }
        }
    }

    debug!("rotation timer stopped");
}

impl Shared {
    fn time_until_next_bucket(&self) -> Duration {
        let interval = self.config.rotation_interval;
        let current = self.state.read().bucket;

        match bucket::next_boundary(current, interval) {
            Ok(boundary) => {
                let now = self.config.zone.wall_clock(self.clock.now());
                bucket::time_until(now, boundary)
            }
            Err(e) => {
                warn!(error = %e, "cannot compute next boundary, sleeping one interval");
                interval
            }
        }
    }
}
