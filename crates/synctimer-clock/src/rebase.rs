//! Periodic re-basing of the scheduler clock.
//!
//! [`MonotonicClock::update`] must run at least once per counter wrap
//! period. [`RebaseTimer`] owns a background thread that calls it at a fixed
//! interval, normally 90% of the wrap period.

use crate::monotonic::MonotonicClock;
use crate::source::CounterSource;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use synctimer_common::error::{ClockError, ClockResult};
use tracing::{debug, info, trace, warn};

/// Background thread re-basing a scheduler clock.
#[derive(Debug)]
pub struct RebaseTimer {
    /// State shared with the re-basing thread.
    state: Arc<RebaseState>,
    /// Join handle of the running thread, `None` while stopped.
    handle: Option<JoinHandle<()>>,
    /// Time between re-bases.
    interval: Duration,
    /// Set while the thread runs; cleared by the thread on exit.
    running: Arc<AtomicBool>,
}

/// Flags and counters shared between [`RebaseTimer`] and its thread.
#[derive(Debug, Default)]
struct RebaseState {
    /// Asks the thread to exit at its next wake-up.
    stop_requested: AtomicBool,
    /// Re-bases performed since the timer was created.
    rebases: AtomicU64,
}

impl RebaseTimer {
    /// Create a stopped timer firing every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Arc::new(RebaseState::default()),
            handle: None,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the re-basing thread for `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Timer`] if the timer is already running, the
    /// interval is zero, or the thread cannot be spawned.
    pub fn start<S>(&mut self, clock: Arc<MonotonicClock<S>>) -> ClockResult<()>
    where
        S: CounterSource + 'static,
    {
        if self.running.load(Ordering::Acquire) {
            return Err(ClockError::Timer("rebase timer already running".into()));
        }
        if self.interval.is_zero() {
            return Err(ClockError::Timer("rebase interval must be non-zero".into()));
        }

        info!(
            interval = %humantime::format_duration(self.interval),
            "Starting rebase timer"
        );

        self.state.stop_requested.store(false, Ordering::Release);

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let interval = self.interval;

        self.running.store(true, Ordering::Release);

        let handle = match thread::Builder::new()
            .name("synctimer-rebase".into())
            .spawn(move || {
                debug!("Rebase thread started");
                let mut deadline = Instant::now() + interval;

                while !state.stop_requested.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < deadline {
                        thread::park_timeout(deadline - now);
                        continue;
                    }

                    let ns = clock.update();
                    let count = state.rebases.fetch_add(1, Ordering::AcqRel) + 1;
                    trace!(ns, count, "Scheduler clock re-based");
                    deadline += interval;
                }

                running.store(false, Ordering::Release);
                debug!("Rebase thread stopped");
            }) {
            Ok(h) => h,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(ClockError::Timer(format!(
                    "failed to spawn rebase thread: {e}"
                )));
            }
        };

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        info!("Stopping rebase timer");
        self.state.stop_requested.store(true, Ordering::Release);
        handle.thread().unpark();
        if let Err(e) = handle.join() {
            warn!("Rebase thread panicked: {:?}", e);
        }
        self.running.store(false, Ordering::Release);
    }

    /// Stop, then start again on `clock`.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn restart<S>(&mut self, clock: Arc<MonotonicClock<S>>) -> ClockResult<()>
    where
        S: CounterSource + 'static,
    {
        self.stop();
        self.start(clock)
    }

    /// Whether the thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of re-bases performed since creation.
    pub fn rebase_count(&self) -> u64 {
        self.state.rebases.load(Ordering::Acquire)
    }

    /// Configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for RebaseTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
