//! Statistics for the decoder and its consumers

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::registry::MonitorSnapshot;

/// Live counters updated by the decoder outside the monitor lock
#[derive(Debug)]
pub(crate) struct DecoderCounters {
    pub packets_submitted: AtomicU64,
    pub not_ready: AtomicU64,
    pub decode_errors: AtomicU64,
    pub deliveries: AtomicU64,
    pub repeats: AtomicU64,
    pub frames_dumped: AtomicU64,
    pub dump_failures: AtomicU64,
    pub started_at: Instant,
}

impl DecoderCounters {
    pub(crate) fn new() -> Self {
        Self {
            packets_submitted: AtomicU64::new(0),
            not_ready: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            repeats: AtomicU64::new(0),
            frames_dumped: AtomicU64::new(0),
            dump_failures: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, monitor: MonitorSnapshot) -> DecoderStats {
        DecoderStats {
            frames_decoded: monitor.sequence,
            packets_submitted: self.packets_submitted.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            repeats: self.repeats.load(Ordering::Relaxed),
            frames_dumped: self.frames_dumped.load(Ordering::Relaxed),
            dump_failures: self.dump_failures.load(Ordering::Relaxed),
            consumer_count: monitor.consumers,
            occupied_slots: monitor.occupied_slots,
            capacity: monitor.capacity,
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Decoder statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct DecoderStats {
    /// Frames stored in the ring since init
    pub frames_decoded: u64,
    /// Packets handed to the backend
    pub packets_submitted: u64,
    /// Submissions that produced no frame
    pub not_ready: u64,
    /// Submissions the backend rejected
    pub decode_errors: u64,
    /// Frames handed to consumers
    pub deliveries: u64,
    /// Requests answered with `Repeat`
    pub repeats: u64,
    /// Frames written to the dump sink
    pub frames_dumped: u64,
    /// Frames that failed to dump
    pub dump_failures: u64,
    /// Known consumer identities
    pub consumer_count: usize,
    /// Ring slots holding a frame
    pub occupied_slots: usize,
    /// Ring capacity
    pub capacity: usize,
    /// Time since init
    pub uptime: Duration,
}

impl DecoderStats {
    /// Decoded frames per second since init
    pub fn framerate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_decoded as f64 / secs
        } else {
            0.0
        }
    }

    /// Ring fill level as a percentage
    pub fn utilization(&self) -> f32 {
        if self.capacity > 0 {
            (self.occupied_slots as f32 / self.capacity as f32) * 100.0
        } else {
            0.0
        }
    }
}
