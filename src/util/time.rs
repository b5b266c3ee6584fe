//! Time utilities for the simulation loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Upper bound on a single frame delta (seconds)
pub const MAX_FRAME_DELTA: f32 = 0.05;

/// Frames longer than this only get one physics sub-step
pub const LONG_FRAME: f32 = 0.022;

/// Measures wall-clock frame deltas
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Raw seconds since the previous call. The simulation clamps this
    /// itself; the quality controller wants the unclamped value.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        elapsed
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a raw frame delta so long stalls do not cause catch-up bursts
pub fn clamp_delta(elapsed: f32) -> f32 {
    if elapsed.is_finite() {
        elapsed.clamp(0.0, MAX_FRAME_DELTA)
    } else {
        0.0
    }
}

/// A countdown advanced by the frame delta
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Countdown {
    remaining: f32,
}

impl Countdown {
    pub fn new(seconds: f32) -> Self {
        Self {
            remaining: seconds.max(0.0),
        }
    }

    /// Advance by `dt`, returns true once the countdown has run out
    pub fn advance(&mut self, dt: f32) -> bool {
        self.remaining = (self.remaining - dt).max(0.0);
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn is_done(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Shorten the countdown, never lengthening it
    pub fn cap(&mut self, seconds: f32) {
        self.remaining = self.remaining.min(seconds);
    }
}
