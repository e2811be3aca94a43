//! C7: inter-call guard timer for `ScanGlobal`/`ScanARaw`.
//!
//! The reference computes elapsed milliseconds from a raw
//! `clock_gettime`/`QueryPerformanceCounter` delta by hand, and on the POSIX
//! path gets the seconds/nanoseconds combination backwards. Built on
//! `Instant::elapsed()` instead, that whole class of bug is unrepresentable.

use std::thread;
use std::time::{Duration, Instant};

/// Enforces a minimum delay between gated calls. The first call after
/// construction always passes through immediately.
pub struct GuardTimer {
    min_gap: Duration,
    last_call: Option<Instant>,
}

impl GuardTimer {
    pub fn new(min_gap_ms: u32) -> Self {
        Self {
            min_gap: Duration::from_millis(min_gap_ms as u64),
            last_call: None,
        }
    }

    /// Block until the configured minimum gap has elapsed since the previous
    /// call, then record this call's timestamp.
    pub fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_gap {
                thread::sleep(self.min_gap - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_does_not_block() {
        let mut guard = GuardTimer::new(5_000);
        let start = Instant::now();
        guard.wait();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn second_call_waits_out_the_remaining_gap() {
        let mut guard = GuardTimer::new(50);
        guard.wait();
        let start = Instant::now();
        guard.wait();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
