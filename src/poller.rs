use std::{
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Drives a tick callback on a dedicated thread: once immediately, then once
/// per interval. At most one worker exists per poller.
#[derive(Default)]
pub struct Poller {
    worker: Option<PollerWorker>,
}

struct PollerWorker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Replaces any running worker. The previous one is stopped and joined
    /// before the new one is spawned.
    pub fn start<F>(&mut self, interval: Duration, tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();

        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let mut tick = tick;
            let mut schedule = RefreshSchedule::new(interval);
            loop {
                schedule.mark_triggered();
                tick();
                match stop_rx.recv_timeout(schedule.remaining()) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        debug!(interval_ms = interval.as_millis() as u64, "poller started");
        self.worker = Some(PollerWorker { stop_tx, handle });
    }

    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("poller worker panicked");
        }
        debug!("poller stopped");
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start-to-start spacing between ticks.
struct RefreshSchedule {
    interval: Duration,
    last_run: Option<Instant>,
}

impl RefreshSchedule {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    fn remaining(&self) -> Duration {
        match self.last_run {
            None => Duration::ZERO,
            Some(instant) => self.interval.saturating_sub(instant.elapsed()),
        }
    }

    fn mark_triggered(&mut self) {
        self.last_run = Some(Instant::now());
    }
}
