//! Frame timing for the simulation loop.
//!
//! The kernel consumes two values every frame: a delta in seconds (clamped so
//! a stalled frame cannot teleport agents) and the whole number of elapsed
//! seconds, which seeds its per-agent randomness. Paused time counts toward
//! neither.
//!
//! # Example
//!
//! ```ignore
//! use ants::time::Time;
//!
//! let mut time = Time::new();
//!
//! // In the redraw callback:
//! time.update();
//!
//! println!("Delta: {:.4}s", time.delta());
//! println!("Seed: {}", time.elapsed_seconds());
//! ```

use std::time::{Duration, Instant};

/// Largest delta handed to the kernel.
pub const MAX_DELTA: Duration = Duration::from_millis(33);

/// Time tracking for the simulation loop.
#[derive(Debug)]
pub struct Time {
    /// When the last frame occurred (or when the clock resumed).
    last_frame: Instant,
    /// Unpaused time since start.
    elapsed: Duration,
    /// Clamped time since last frame in seconds.
    delta_secs: f32,
    /// Total simulated frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Upper bound for `delta()`.
    max_delta: Duration,
    /// Fixed delta time for deterministic updates (optional).
    fixed_delta: Option<f32>,
}

impl Time {
    /// Create a new time tracker starting from now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a time tracker whose clock starts at `now`.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            last_frame: now,
            elapsed: Duration::ZERO,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            max_delta: MAX_DELTA,
            fixed_delta: None,
        }
    }

    /// Update timing values. Call once per frame.
    ///
    /// Returns `(elapsed_seconds, delta_time)`.
    pub fn update(&mut self) -> (u32, f32) {
        self.update_at(Instant::now())
    }

    /// Update timing values as if the frame happened at `now`.
    pub fn update_at(&mut self, now: Instant) -> (u32, f32) {
        let raw = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;

        if self.paused {
            self.delta_secs = 0.0;
            return (self.elapsed_seconds(), self.delta_secs);
        }

        self.elapsed += raw;
        self.delta_secs = self
            .fixed_delta
            .unwrap_or_else(|| raw.min(self.max_delta).as_secs_f32());
        self.frame_count += 1;

        let fps_elapsed = now.saturating_duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        (self.elapsed_seconds(), self.delta_secs)
    }

    /// Whole seconds of unpaused time. Changes at most once per second.
    #[inline]
    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed.as_secs().min(u32::MAX as u64) as u32
    }

    /// Unpaused time since start.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Clamped time since last frame in seconds.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Simulated frames since start. Paused frames are not counted.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop the clock. `delta()` is zero and elapsed time freezes until resumed.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Restart the clock. The paused interval is discarded.
    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    pub fn resume_at(&mut self, now: Instant) {
        if self.paused {
            self.last_frame = now;
            self.paused = false;
        }
    }

    /// Toggle pause state and return the new state.
    pub fn toggle_pause(&mut self) -> bool {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
        self.paused
    }

    /// Set a fixed delta time for deterministic updates.
    ///
    /// Pass `None` to use real, clamped frame timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Restart from zero. The pause state is kept.
    pub fn reset(&mut self) {
        let paused = self.paused;
        *self = Self::new();
        self.paused = paused;
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_new() {
        let time = Time::new();
        assert_eq!(time.frame(), 0);
        assert_eq!(time.elapsed_seconds(), 0);
        assert!(!time.is_paused());
    }

    #[test]
    fn test_time_update() {
        let t0 = Instant::now();
        let mut time = Time::starting_at(t0);
        let (seconds, delta) = time.update_at(t0 + Duration::from_millis(10));

        assert_eq!(seconds, 0);
        assert!((delta - 0.010).abs() < 1e-4);
        assert_eq!(time.frame(), 1);
    }

    #[test]
    fn test_delta_is_clamped() {
        let t0 = Instant::now();
        let mut time = Time::starting_at(t0);
        let (_, delta) = time.update_at(t0 + Duration::from_secs(2));

        assert!((delta - MAX_DELTA.as_secs_f32()).abs() < 1e-6);
        // elapsed follows the wall clock, only the delta is clamped
        assert_eq!(time.elapsed_seconds(), 2);
    }

    #[test]
    fn test_elapsed_seconds_are_whole() {
        let t0 = Instant::now();
        let mut time = Time::starting_at(t0);
        time.update_at(t0 + Duration::from_millis(999));
        assert_eq!(time.elapsed_seconds(), 0);
        time.update_at(t0 + Duration::from_millis(1500));
        assert_eq!(time.elapsed_seconds(), 1);
    }

    #[test]
    fn test_time_pause() {
        let t0 = Instant::now();
        let mut time = Time::starting_at(t0);
        time.update_at(t0 + Duration::from_millis(500));

        time.pause();
        assert!(time.is_paused());

        let elapsed_before = time.elapsed();
        time.update_at(t0 + Duration::from_secs(5));

        assert_eq!(time.elapsed(), elapsed_before);
        assert_eq!(time.delta(), 0.0);
        assert_eq!(time.frame(), 1);
    }

    #[test]
    fn test_paused_interval_excluded_after_resume() {
        let t0 = Instant::now();
        let mut time = Time::starting_at(t0);
        time.update_at(t0 + Duration::from_millis(400));

        time.pause();
        time.update_at(t0 + Duration::from_secs(10));
        time.resume_at(t0 + Duration::from_secs(10));
        time.update_at(t0 + Duration::from_millis(10_300));

        assert_eq!(time.elapsed(), Duration::from_millis(700));
        assert_eq!(time.elapsed_seconds(), 0);
    }

    #[test]
    fn test_fixed_delta() {
        let t0 = Instant::now();
        let mut time = Time::starting_at(t0);
        time.set_fixed_delta(Some(1.0 / 60.0));
        time.update_at(t0 + Duration::from_millis(100));

        assert!((time.delta() - 1.0 / 60.0).abs() < 0.0001);
    }
}
