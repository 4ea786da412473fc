use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use glowconfig::{FeedMode, FeedSection};
use rand::prelude::*;
use tracing::{debug, trace};

/// How often a watched cover is re-stat'ed.
const WATCH_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("cover feed needs at least one cover image")]
    Empty,
    #[error("feed interval must be greater than zero")]
    ZeroInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// First cover announced by [`CoverFeed::start`].
    Initial,
    Interval,
    Skip,
    /// Same path, new file contents; memoized palettes must be discarded.
    Rewritten,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverChange {
    pub path: PathBuf,
    pub reason: ChangeReason,
    pub started_at: Instant,
}

impl CoverChange {
    pub fn requires_refresh(&self) -> bool {
        self.reason == ChangeReason::Rewritten
    }
}

/// Rotates through a list of cover files, announcing "active image changed"
/// events on a fixed interval.
pub struct CoverFeed {
    covers: Vec<PathBuf>,
    mode: FeedMode,
    interval: Duration,
    watch: bool,
    order: Vec<usize>,
    cursor: usize,
    started: bool,
    last_started: Instant,
    last_probe: Instant,
    last_modified: Option<SystemTime>,
    rng: StdRng,
}

impl CoverFeed {
    pub fn new(
        covers: Vec<PathBuf>,
        mode: FeedMode,
        interval: Duration,
        seed: u64,
        now: Instant,
    ) -> Result<Self, FeedError> {
        if covers.is_empty() {
            return Err(FeedError::Empty);
        }
        if interval.is_zero() {
            return Err(FeedError::ZeroInterval);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let order = build_order(covers.len(), mode, None, &mut rng);
        Ok(Self {
            covers,
            mode,
            interval,
            watch: false,
            order,
            cursor: 0,
            started: false,
            last_started: now,
            last_probe: now,
            last_modified: None,
            rng,
        })
    }

    /// Builds a feed from the `[feed]` section; `covers` replaces the
    /// configured list when non-empty.
    pub fn from_config(
        section: &FeedSection,
        covers: Vec<PathBuf>,
        seed: u64,
        now: Instant,
    ) -> Result<Self, FeedError> {
        let covers = if covers.is_empty() {
            section.covers.clone()
        } else {
            covers
        };
        let feed = Self::new(
            covers,
            section.mode,
            section.interval,
            section.seed.unwrap_or(seed),
            now,
        )?;
        Ok(feed.with_watch(section.watch))
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn len(&self) -> usize {
        self.covers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covers.is_empty()
    }

    pub fn current(&self) -> &Path {
        &self.covers[self.order[self.cursor]]
    }

    /// Announces the first cover. Later calls return `None`.
    pub fn start(&mut self, now: Instant) -> Option<CoverChange> {
        if self.started {
            return None;
        }
        self.started = true;
        self.last_started = now;
        self.last_probe = now;
        self.last_modified = modified(self.current());
        Some(self.change(ChangeReason::Initial, now))
    }

    pub fn tick(&mut self, now: Instant) -> Option<CoverChange> {
        if !self.started {
            return self.start(now);
        }

        if self.covers.len() > 1 && now.duration_since(self.last_started) >= self.interval {
            self.advance(now);
            return Some(self.change(ChangeReason::Interval, now));
        }

        if self.watch && now.duration_since(self.last_probe) >= WATCH_POLL {
            self.last_probe = now;
            let stamp = modified(self.current());
            if stamp.is_some() && stamp != self.last_modified {
                trace!(path = %self.current().display(), "cover modified on disk");
                self.last_modified = stamp;
                return Some(self.change(ChangeReason::Rewritten, now));
            }
        }

        None
    }

    /// Moves to the next cover immediately; `None` for a single-cover feed.
    pub fn skip(&mut self, now: Instant) -> Option<CoverChange> {
        if !self.started || self.covers.len() <= 1 {
            return None;
        }
        self.advance(now);
        Some(self.change(ChangeReason::Skip, now))
    }

    /// When the feed next wants attention, if ever.
    pub fn next_deadline(&self) -> Option<Instant> {
        let rotation = (self.covers.len() > 1).then(|| self.last_started + self.interval);
        let probe = self.watch.then(|| self.last_probe + WATCH_POLL);
        match (rotation, probe) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn advance(&mut self, now: Instant) {
        let previous = self.order[self.cursor];
        self.cursor += 1;
        if self.cursor >= self.order.len() {
            self.order = build_order(self.covers.len(), self.mode, Some(previous), &mut self.rng);
            self.cursor = 0;
        }
        self.last_started = now;
        self.last_probe = now;
        self.last_modified = modified(self.current());
        debug!(
            path = %self.current().display(),
            mode = ?self.mode,
            "advanced cover feed"
        );
    }

    fn change(&self, reason: ChangeReason, now: Instant) -> CoverChange {
        CoverChange {
            path: self.current().to_path_buf(),
            reason,
            started_at: now,
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Shuffled orders never start with the cover that just finished.
fn build_order(len: usize, mode: FeedMode, previous: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    match mode {
        FeedMode::Continuous => {}
        FeedMode::Shuffle => {
            order.shuffle(rng);
            if len > 1 && previous == Some(order[0]) {
                order.swap(0, len - 1);
            }
        }
    }
    order
}
