use std::time::{Duration, Instant};

/// Frame-rate gate measured from the last processed frame.
#[derive(Debug, Clone)]
pub struct FramePacer {
    target_interval: Option<Duration>,
    last_processed: Option<Instant>,
}

impl FramePacer {
    pub fn new(target_fps: f32) -> Self {
        let target_interval = if target_fps.is_finite() && target_fps > 0.0 {
            Some(Duration::from_secs_f64(1.0 / f64::from(target_fps)))
        } else {
            None
        };
        Self {
            target_interval,
            last_processed: None,
        }
    }

    pub fn target_interval(&self) -> Option<Duration> {
        self.target_interval
    }

    pub fn reset(&mut self, now: Instant) {
        self.last_processed = Some(now);
    }

    /// Restarts the measurement at `now` without processing a frame, so time
    /// spent paused is never credited to the animation.
    pub fn hold(&mut self, now: Instant) {
        self.last_processed = Some(now);
    }

    /// Elapsed time since the last processed frame when a new frame may be
    /// processed at `now`; `None` while throttled.
    pub fn try_advance(&mut self, now: Instant) -> Option<Duration> {
        let last = *self.last_processed.get_or_insert(now);
        let elapsed = now.saturating_duration_since(last);
        let due = match self.target_interval {
            Some(interval) => elapsed >= interval,
            None => true,
        };
        if due {
            self.last_processed = Some(now);
            Some(elapsed)
        } else {
            None
        }
    }
}
