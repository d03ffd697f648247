//! Per-stage timing and frame rate logging.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use itertools::Itertools;

/// Weight of the newest sample in the running average.
const EMA_ALPHA: f32 = 0.3;

/// Running average of how long one processing stage takes.
///
/// Displaying a timer with `{}` prints the average and the number of samples since it was last
/// displayed, then starts over.
pub struct Timer {
    name: &'static str,
    stats: Mutex<Stats>,
}

#[derive(Default)]
struct Stats {
    avg_secs: Option<f32>,
    samples: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stats: Mutex::new(Stats::default()),
        }
    }

    /// Runs `f` and records how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        f()
    }

    /// Records the time until the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            started: Instant::now(),
        }
    }

    fn record(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f32();
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let avg = stats
            .avg_secs
            .map_or(secs, |avg| EMA_ALPHA * secs + (1.0 - EMA_ALPHA) * avg);
        stats.avg_secs = Some(avg);
        stats.samples += 1;
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Stats { avg_secs, samples } = {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *stats)
        };
        let avg_ms = avg_secs.unwrap_or(0.0) * 1000.0;
        write!(f, "{}: {samples}x{avg_ms:.01}ms", self.name)
    }
}

/// The clone starts without samples.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

pub struct TimerGuard<'a> {
    timer: &'a Timer,
    started: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.started.elapsed());
    }
}

/// Counts frames and logs the rate about once a second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    window_start: Instant,
}

impl FpsCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            window_start: Instant::now(),
        }
    }

    /// Counts a frame. When a second has passed, logs the frame rate followed by `extra`, which is
    /// usually a list of [`Timer`]s.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.window_start.elapsed() < Duration::from_secs(1) {
            return;
        }
        log::debug!(
            "{}: {} FPS ({})",
            self.name,
            self.frames,
            extra.into_iter().format(", ")
        );
        self.frames = 0;
        self.window_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_averages_and_resets() {
        let timer = Timer::new("detect");
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        // 0.3 * 20 + 0.7 * 10
        assert_eq!(timer.to_string(), "detect: 2x13.0ms");
        assert_eq!(timer.to_string(), "detect: 0x0.0ms");
    }

    #[test]
    fn timer_guard_records() {
        let timer = Timer::new("t");
        assert_eq!(timer.time(|| 42), 42);
        assert!(timer.to_string().starts_with("t: 1x"));
    }

    #[test]
    fn fps_counter_resets_after_a_second() {
        let mut fps = FpsCounter::new("test");
        fps.tick_with(std::iter::empty::<&Timer>());
        assert_eq!(fps.frames, 1);
        fps.window_start -= Duration::from_secs(2);
        fps.tick_with([&Timer::new("t")]);
        assert_eq!(fps.frames, 0);
    }
}
