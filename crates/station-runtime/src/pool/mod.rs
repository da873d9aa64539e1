//! # Concurrency Pool
//!
//! Bounded set of background workers shared by every module.
//!
//! ```text
//! run(task)               ──▶ worker (spawn_blocking)
//! run_after(task, delay)  ──▶ sleep ──▶ worker
//! run_every(name, task)   ──▶ loop { sleep ──▶ worker ──▶ wait for it }
//! ```
//!
//! A recurring timer waits for its own body before sleeping again, so a
//! timer never overlaps with itself. Timers are keyed by name; registering
//! a name again replaces the earlier timer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use station_telemetry::TIMER_RUNS;
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of blocking workers.
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Failed to build worker runtime: {0}")]
    Build(#[from] std::io::Error),
}

pub struct ConcurrencyPool {
    /// `None` only while dropping.
    runtime: Option<Runtime>,
    handle: Handle,
    workers: usize,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ConcurrencyPool {
    /// Build a pool with at most `workers` tasks running at once.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("station-pool")
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();

        info!(workers, "Concurrency pool started");

        Ok(Self {
            runtime: Some(runtime),
            handle,
            workers,
            timers: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task` on a worker as soon as one is free.
    pub fn run<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        drop(self.handle.spawn_blocking(task));
    }

    /// Run `task` once after `delay`.
    pub fn run_after<F>(&self, task: F, delay: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = self.handle.clone();
        drop(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = handle.spawn_blocking(task).await {
                warn!(error = %e, "Delayed task failed");
            }
        }));
    }

    /// Run `task` every `interval` until cancelled or the pool stops.
    ///
    /// The first run happens one interval after registration. If a timer
    /// named `name` already exists it is cancelled and replaced.
    pub fn run_every<F>(&self, name: &str, task: F, interval: Duration)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let task = Arc::new(task);
        let handle = self.handle.clone();
        let timer = name.to_string();

        let join = self.handle.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let body = Arc::clone(&task);
                if let Err(e) = handle.spawn_blocking(move || body()).await {
                    warn!(timer = %timer, error = %e, "Timer task failed");
                }
                TIMER_RUNS.with_label_values(&[timer.as_str()]).inc();
            }
        });

        if let Some(previous) = self.timers.lock().insert(name.to_string(), join) {
            debug!(timer = name, "Replacing timer");
            previous.abort();
        }
    }

    /// Cancel a recurring timer. A run already in progress finishes.
    pub fn cancel(&self, name: &str) -> bool {
        match self.timers.lock().remove(name) {
            Some(join) => {
                join.abort();
                true
            }
            None => false,
        }
    }

    /// Names of the active timers, sorted.
    #[must_use]
    pub fn timer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.timers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Halt every recurring timer. One-shot tasks already queued still run.
    pub fn stop(&self) {
        let timers: Vec<(String, JoinHandle<()>)> = self.timers.lock().drain().collect();
        for (name, join) in timers {
            debug!(timer = %name, "Stopping timer");
            join.abort();
        }
    }
}

impl Drop for ConcurrencyPool {
    fn drop(&mut self) {
        self.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(ConcurrencyPool::new(0), Err(PoolError::NoWorkers)));
    }

    #[test]
    fn test_run_executes_off_thread() {
        let pool = ConcurrencyPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();

        pool.run(move || {
            tx.send(thread::current().id()).unwrap();
        });

        let worker = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_run_after_waits() {
        let pool = ConcurrencyPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        let started = std::time::Instant::now();

        pool.run_after(move || tx.send(()).unwrap(), Duration::from_millis(50));

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_run_every_repeats_and_cancels() {
        let pool = ConcurrencyPool::new(2).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        pool.run_every(
            "poll",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(10),
        );
        assert_eq!(pool.timer_names(), vec!["poll".to_string()]);

        thread::sleep(Duration::from_millis(120));
        assert!(pool.cancel("poll"));
        assert!(!pool.cancel("poll"));

        let seen = runs.load(Ordering::SeqCst);
        assert!(seen >= 2, "timer ran {seen} times");

        thread::sleep(Duration::from_millis(60));
        assert!(runs.load(Ordering::SeqCst) <= seen + 1);
    }

    #[test]
    fn test_run_every_never_overlaps_itself() {
        let pool = ConcurrencyPool::new(4).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        pool.run_every(
            "slow",
            move || {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(30));
                a.fetch_sub(1, Ordering::SeqCst);
            },
            Duration::from_millis(1),
        );

        thread::sleep(Duration::from_millis(200));
        pool.stop();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_name_replaces_timer() {
        let pool = ConcurrencyPool::new(2).unwrap();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (f, s) = (Arc::clone(&first), Arc::clone(&second));

        pool.run_every("tick", move || { f.fetch_add(1, Ordering::SeqCst); }, Duration::from_millis(10));
        pool.run_every("tick", move || { s.fetch_add(1, Ordering::SeqCst); }, Duration::from_millis(10));

        thread::sleep(Duration::from_millis(100));
        pool.stop();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert!(second.load(Ordering::SeqCst) >= 1);
        assert!(pool.timer_names().is_empty());
    }
}
