//! C7: per-context communication statistics, mirroring `SSCP_STATISTICS_ST`.

use std::time::Instant;

/// Snapshot returned by [`crate::SscpContext::get_statistics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub total_time_ms: u64,
    pub total_errors: u32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub session_count: u32,
    pub session_time_ms: u64,
    pub session_counter: u32,
}

/// Internal accumulator: tracks the running counters plus the two
/// timestamps (`open`, `session`) statistics are measured relative to.
pub(crate) struct StatsTracker {
    when_open: Option<Instant>,
    when_session: Option<Instant>,
    total_errors: u32,
    bytes_sent: u64,
    bytes_received: u64,
    session_count: u32,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            when_open: None,
            when_session: None,
            total_errors: 0,
            bytes_sent: 0,
            bytes_received: 0,
            session_count: 0,
        }
    }

    pub fn on_open(&mut self) {
        self.when_open = Some(Instant::now());
    }

    pub fn on_authenticated(&mut self) {
        self.session_count += 1;
        self.when_session = Some(Instant::now());
    }

    pub fn on_bytes_sent(&mut self, n: usize) {
        self.bytes_sent += n as u64;
    }

    pub fn on_bytes_received(&mut self, n: usize) {
        self.bytes_received += n as u64;
    }

    pub fn on_recovered_timeout(&mut self) {
        self.total_errors += 1;
    }

    pub fn snapshot(&self, counter: u32) -> Statistics {
        let total_time_ms = self.when_open.map_or(0, |t| t.elapsed().as_millis() as u64);
        let session_time_ms = self.when_session.map_or(0, |t| t.elapsed().as_millis() as u64);
        Statistics {
            total_time_ms,
            total_errors: self.total_errors,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            session_count: self.session_count,
            session_time_ms,
            session_counter: counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_count_accumulates_across_reauthentication() {
        let mut tracker = StatsTracker::new();
        tracker.on_open();
        tracker.on_authenticated();
        tracker.on_authenticated();
        assert_eq!(tracker.snapshot(1).session_count, 2);
    }

    #[test]
    fn bytes_and_errors_accumulate() {
        let mut tracker = StatsTracker::new();
        tracker.on_bytes_sent(10);
        tracker.on_bytes_received(20);
        tracker.on_recovered_timeout();
        tracker.on_recovered_timeout();
        let snap = tracker.snapshot(0);
        assert_eq!(snap.bytes_sent, 10);
        assert_eq!(snap.bytes_received, 20);
        assert_eq!(snap.total_errors, 2);
    }
}
