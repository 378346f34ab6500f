//! Frame timing utilities

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock timer that yields the delta between consecutive frames
pub struct FrameTimer {
    last_frame: Instant,
    total_time: f32,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Mark the end of a frame and return the time it took in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.total_time += delta;
        self.last_frame = now;
        self.frame_count += 1;
        delta
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Measures how long a section of work took
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a stopwatch that is already running
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start or resume
    pub fn start(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    /// Stop and accumulate
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Total elapsed time including a running section
    pub fn elapsed(&self) -> Duration {
        self.elapsed + self.start_time.map_or(Duration::ZERO, |start| start.elapsed())
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }
}

/// Seconds since the unix epoch, used to stamp collision events
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timer_reports_delta_and_fps() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.average_fps(), 0.0);
        std::thread::sleep(Duration::from_millis(2));
        let delta = timer.tick();
        assert!(delta >= 0.002);
        timer.tick();
        let fps = timer.average_fps();
        assert!(fps > 0.0 && fps < 1001.0, "{fps}");
    }

    #[test]
    fn test_stopwatch_accumulates_across_sections() {
        let mut stopwatch = Stopwatch::start_new();
        std::thread::sleep(Duration::from_millis(2));
        stopwatch.stop();
        let first = stopwatch.elapsed();
        assert!(first >= Duration::from_millis(2));

        // stopped stopwatch does not advance
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(stopwatch.elapsed(), first);
    }

    #[test]
    fn test_unix_timestamp_is_recent() {
        // 2020-01-01
        assert!(unix_timestamp() > 1_577_836_800);
    }
}
