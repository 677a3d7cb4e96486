//! Wall-clock measurement for a bounded span of work.
//!
//! A [`Timer`] can only be turned into a [`Span`] by stopping it, so an elapsed
//! value is never observable before the measured work has finished.

use std::time::{Duration, Instant};

/// A running measurement. Consumed by [`Timer::stop`].
#[derive(Debug)]
#[must_use = "a timer measures nothing unless it is stopped"]
pub struct Timer {
    started: Instant,
}

/// A completed measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    elapsed: Duration,
}

impl Timer {
    /// Record the begin instant.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Record the end instant and return the completed span.
    pub fn stop(self) -> Span {
        Span {
            elapsed: self.started.elapsed(),
        }
    }
}

impl Span {
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Run `work` and return its result together with the time it took.
pub fn timed<T>(work: impl FnOnce() -> T) -> (T, Span) {
    let timer = Timer::start();
    let value = work();
    (value, timer.stop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn span_covers_the_measured_work() {
        let timer = Timer::start();
        thread::sleep(Duration::from_millis(20));
        let span = timer.stop();
        assert!(span.elapsed() >= Duration::from_millis(20));
        assert!(span.elapsed_seconds() >= 0.02);
    }

    #[test]
    fn timed_returns_closure_value() {
        let (value, span) = timed(|| 41 + 1);
        assert_eq!(value, 42);
        assert!(span.elapsed_seconds() >= 0.0);
    }
}
