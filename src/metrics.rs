//! Lightweight global metrics for ImageBank.
//!
//! Потокобезопасные атомарные счётчики:
//! - lazy checks (bank already cached vs. images still required)
//! - banks written / read
//! - frames encoded / decoded

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Lazy checks -----
static LAZY_HITS: AtomicU64 = AtomicU64::new(0);
static LAZY_MISSES: AtomicU64 = AtomicU64::new(0);

// ----- Banks -----
static BANKS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static BANKS_READ: AtomicU64 = AtomicU64::new(0);

// ----- Frames -----
static FRAMES_ENCODED: AtomicU64 = AtomicU64::new(0);
static FRAMES_DECODED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub lazy_hits: u64,
    pub lazy_misses: u64,
    pub banks_written: u64,
    pub banks_read: u64,
    pub frames_encoded: u64,
    pub frames_decoded: u64,
}

impl MetricsSnapshot {
    /// Share of lazy checks answered from cache (0.0 when nothing was checked).
    pub fn lazy_hit_ratio(&self) -> f64 {
        let total = self.lazy_hits + self.lazy_misses;
        if total == 0 {
            0.0
        } else {
            self.lazy_hits as f64 / total as f64
        }
    }
}

pub fn record_lazy_hit() {
    LAZY_HITS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_lazy_miss() {
    LAZY_MISSES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_bank_written(frames: usize) {
    BANKS_WRITTEN.fetch_add(1, Ordering::Relaxed);
    FRAMES_ENCODED.fetch_add(frames as u64, Ordering::Relaxed);
}

pub fn record_bank_read(frames: usize) {
    BANKS_READ.fetch_add(1, Ordering::Relaxed);
    FRAMES_DECODED.fetch_add(frames as u64, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        lazy_hits: LAZY_HITS.load(Ordering::Relaxed),
        lazy_misses: LAZY_MISSES.load(Ordering::Relaxed),
        banks_written: BANKS_WRITTEN.load(Ordering::Relaxed),
        banks_read: BANKS_READ.load(Ordering::Relaxed),
        frames_encoded: FRAMES_ENCODED.load(Ordering::Relaxed),
        frames_decoded: FRAMES_DECODED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    for c in [
        &LAZY_HITS,
        &LAZY_MISSES,
        &BANKS_WRITTEN,
        &BANKS_READ,
        &FRAMES_ENCODED,
        &FRAMES_DECODED,
    ] {
        c.store(0, Ordering::Relaxed);
    }
}
