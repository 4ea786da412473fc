use std::time::{Duration, Instant};

/// Trailing-edge debouncer for viewport change notifications.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    window: Duration,
    deadline: Option<Instant>,
    coalesced: u32,
}

impl ResizeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            coalesced: 0,
        }
    }

    /// Records a notification and pushes the deadline out by one window.
    pub fn notify(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
        self.coalesced = self.coalesced.saturating_add(1);
    }

    /// Returns the number of notifications folded into this flush once the
    /// quiet period has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<u32> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(std::mem::take(&mut self.coalesced))
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.coalesced = 0;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn burst_collapses_into_one_flush() {
        let start = Instant::now();
        let mut debouncer = ResizeDebouncer::new(WINDOW);
        for step in 0..5 {
            debouncer.notify(start + Duration::from_millis(step * 20));
        }
        assert!(debouncer.take_due(start + Duration::from_millis(150)).is_none());
        assert_eq!(debouncer.take_due(start + Duration::from_millis(180)), Some(5));
        assert!(debouncer.take_due(start + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn cancel_drops_pending_flush() {
        let start = Instant::now();
        let mut debouncer = ResizeDebouncer::new(WINDOW);
        debouncer.notify(start);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert!(debouncer.take_due(start + WINDOW).is_none());
    }
}
