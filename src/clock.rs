use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A monotonic time source in seconds.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to. Clones share the same time, so a
/// driver (or a test) can keep a handle after giving one to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds_bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        let now = self.now() + seconds.max(0.0);
        self.seconds_bits.store(now.to_bits(), Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Relaxed))
    }
}

/// Per-step delta time bookkeeping.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_time: f64,
    elapsed: f64,
}

impl FrameClock {
    pub fn new(now: f64) -> Self {
        Self { last_time: now, elapsed: 0.0 }
    }

    /// Seconds since the previous tick (never negative).
    pub fn tick(&mut self, now: f64) -> f32 {
        let delta = (now - self.last_time).max(0.0);
        self.last_time = now;
        self.elapsed += delta;
        delta as f32
    }

    /// Restarts delta measurement at `now` without accumulating the gap.
    pub fn reset(&mut self, now: f64) {
        self.last_time = now;
    }

    /// Total simulated seconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}
