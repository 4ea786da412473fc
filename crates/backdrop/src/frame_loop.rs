use std::time::{Duration, Instant};

/// Token for the currently scheduled frame callback of one mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationLoopHandle {
    generation: u64,
}

impl AnimationLoopHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Cancellable repeating task that schedules the next run only once the
/// current one has finished.
///
/// `poll` hands the due callback to the caller and leaves nothing scheduled
/// while the frame runs, so frames cannot overlap; the caller puts it back
/// with `reschedule`. A handle from a cancelled or restarted loop is stale and
/// rescheduling it does nothing.
#[derive(Debug)]
pub struct FrameLoop {
    tick: Duration,
    generation: u64,
    active: Option<u64>,
    scheduled: Option<Instant>,
}

impl FrameLoop {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            generation: 0,
            active: None,
            scheduled: None,
        }
    }

    /// Starts a fresh loop whose first callback is due immediately.
    pub fn start(&mut self, now: Instant) -> AnimationLoopHandle {
        self.generation += 1;
        self.active = Some(self.generation);
        self.scheduled = Some(now);
        AnimationLoopHandle {
            generation: self.generation,
        }
    }

    pub fn handle(&self) -> Option<AnimationLoopHandle> {
        self.active
            .map(|generation| AnimationLoopHandle { generation })
    }

    /// Takes the callback if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<AnimationLoopHandle> {
        let generation = self.active?;
        match self.scheduled {
            Some(deadline) if deadline <= now => {
                self.scheduled = None;
                Some(AnimationLoopHandle { generation })
            }
            _ => None,
        }
    }

    /// Queues the next callback one tick after `now`. Returns `false` for a
    /// stale handle or when a callback is already queued.
    pub fn reschedule(&mut self, handle: AnimationLoopHandle, now: Instant) -> bool {
        if self.active != Some(handle.generation) || self.scheduled.is_some() {
            return false;
        }
        self.scheduled = Some(now + self.tick);
        true
    }

    pub fn cancel(&mut self) {
        self.active = None;
        self.scheduled = None;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduled
    }
}
