//! Progress monitor.
//!
//! The monitor never takes the ring lock. It samples the atomic counters on
//! a fixed interval and rewrites a single status line. It is stopped
//! cooperatively through a [`StopSignal`] once both workers are done.

use crate::{Metrics, MetricsSnapshot};
use std::io::{self, Write};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// One-shot stop flag that can be waited on with a timeout.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes the waiter. Idempotent.
    pub fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for at most `timeout`, returning early if the flag is raised.
    /// Returns whether the flag is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = self
            .wake
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// Formats one status line, starting with a carriage return so that the
/// next line overwrites it.
pub fn render_progress(snapshot: &MetricsSnapshot) -> String {
    format!(
        "\rRead {:>3}%, Wrote {:>3}%, Waits (read/write): ({}/{})",
        snapshot.read_percent(),
        snapshot.write_percent(),
        snapshot.read_waits,
        snapshot.write_waits
    )
}

/// Periodic progress printer.
pub struct Monitor<W> {
    metrics: Arc<Metrics>,
    stop: Arc<StopSignal>,
    interval: Duration,
    out: W,
}

impl<W: Write> Monitor<W> {
    pub fn new(metrics: Arc<Metrics>, stop: Arc<StopSignal>, interval: Duration, out: W) -> Self {
        Self {
            metrics,
            stop,
            interval,
            out,
        }
    }

    /// Prints a status line every interval until stopped, then prints one
    /// last line with the final counters. Returns the number of lines
    /// printed.
    pub fn run(mut self) -> io::Result<u64> {
        let mut lines = 0;
        loop {
            self.print()?;
            lines += 1;
            if self.stop.wait_timeout(self.interval) {
                break;
            }
        }
        self.print()?;
        Ok(lines + 1)
    }

    fn print(&mut self) -> io::Result<()> {
        let line = render_progress(&self.metrics.snapshot());
        self.out.write_all(line.as_bytes())?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_render_progress_format() {
        let snapshot = MetricsSnapshot {
            bytes_produced: 50,
            bytes_consumed: 7,
            read_waits: 3,
            write_waits: 12,
            total_size: 100,
            ..MetricsSnapshot::default()
        };
        assert_eq!(
            render_progress(&snapshot),
            "\rRead  50%, Wrote   7%, Waits (read/write): (3/12)"
        );
    }

    #[test]
    fn test_render_progress_empty_input() {
        assert_eq!(
            render_progress(&MetricsSnapshot::default()),
            "\rRead 100%, Wrote 100%, Waits (read/write): (0/0)"
        );
    }

    #[test]
    fn test_stop_signal_wakes_waiter_early() {
        let stop = Arc::new(StopSignal::new());
        let waiter = Arc::clone(&stop);

        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(10));
        stop.stop();

        assert!(handle.join().unwrap());
        assert!(stop.is_stopped());
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_stop_signal_times_out() {
        let stop = StopSignal::new();
        assert!(!stop.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_monitor_prints_until_stopped() {
        let metrics = Arc::new(Metrics::new());
        metrics.set_total_size(200);
        let stop = Arc::new(StopSignal::new());

        let (monitor_metrics, monitor_stop) = (Arc::clone(&metrics), Arc::clone(&stop));
        let handle = thread::spawn(move || {
            let mut out = Vec::new();
            let monitor = Monitor::new(
                monitor_metrics,
                monitor_stop,
                Duration::from_millis(1),
                &mut out,
            );
            let lines = monitor.run().unwrap();
            (lines, String::from_utf8(out).unwrap())
        });

        thread::sleep(Duration::from_millis(20));
        metrics.add_produced(200);
        metrics.add_consumed(100);
        stop.stop();

        let (lines, out) = handle.join().unwrap();
        assert!(lines >= 2);
        assert_eq!(out.matches('\r').count() as u64, lines);
        assert!(out.ends_with("\rRead 100%, Wrote  50%, Waits (read/write): (0/0)"));
    }

    #[test]
    fn test_monitor_already_stopped_prints_twice() {
        let stop = Arc::new(StopSignal::new());
        stop.stop();

        let mut out = Vec::new();
        let lines = Monitor::new(
            Arc::new(Metrics::new()),
            stop,
            Duration::from_secs(60),
            &mut out,
        )
        .run()
        .unwrap();

        assert_eq!(lines, 2);
        assert_eq!(out.iter().filter(|&&b| b == b'\r').count(), 2);
    }
}
