//! Per-worker telemetry: `{cpuPercent, microsecondsPerBlock}` plus an
//! underrun counter, published with relaxed ordering (§4.9, §4.11 — "they
//! are hints, not synchronisation"). Grounded on `rf_realtime::masscore::AtomicStats`,
//! narrowed from a running min/max/average to the single latest-block
//! snapshot C11 actually polls.

use std::time::Duration;

use portable_atomic::{AtomicF64, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorkerSnapshot {
    pub microseconds_per_block: f64,
    pub cpu_percent: f64,
    pub underruns: u64,
}

pub struct WorkerTelemetry {
    microseconds_per_block: AtomicF64,
    cpu_percent: AtomicF64,
    underruns: AtomicU64,
}

impl Default for WorkerTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerTelemetry {
    pub fn new() -> Self {
        Self {
            microseconds_per_block: AtomicF64::new(0.0),
            cpu_percent: AtomicF64::new(0.0),
            underruns: AtomicU64::new(0),
        }
    }

    pub fn record_block(&self, elapsed: Duration, block_duration: Duration) {
        let micros = elapsed.as_secs_f64() * 1_000_000.0;
        self.microseconds_per_block.store(micros, Ordering::Relaxed);
        let cpu_percent = if block_duration.as_secs_f64() > 0.0 {
            elapsed.as_secs_f64() / block_duration.as_secs_f64() * 100.0
        } else {
            0.0
        };
        self.cpu_percent.store(cpu_percent, Ordering::Relaxed);
    }

    pub fn record_underrun(&self) {
        let total = self.underruns.fetch_add(1, Ordering::Relaxed) + 1;
        log::warn!("worker missed its completion deadline, underrun count={total}");
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            microseconds_per_block: self.microseconds_per_block.load(Ordering::Relaxed),
            cpu_percent: self.cpu_percent.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}
