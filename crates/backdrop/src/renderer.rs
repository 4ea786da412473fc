use std::time::{Duration, Instant};

use coverpalette::Palette;
use tracing::{debug, error, info, trace, warn};

use crate::engine::{EngineError, GradientEngine};
use crate::environment::Environment;
use crate::frame_loop::{AnimationLoopHandle, FrameLoop};
use crate::pacer::FramePacer;
use crate::resize::ResizeDebouncer;
use crate::types::{BackdropOptions, RenderState, SurfaceSize};

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("renderer cannot mount while {0}")]
    InvalidState(RenderState),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Why a frame callback ran without drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    Hidden,
    ReducedMotion,
    /// Less than one frame interval since the last processed frame.
    Throttled,
}

/// Result of one call to [`BackdropRenderer::on_frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The renderer is not running.
    Inactive,
    /// No frame callback was due yet.
    NotDue,
    Gated(GateReason),
    /// Animation advanced and one frame was drawn.
    Drawn { shader_time: f64 },
    /// Redrawn without advancing time (new palette or reallocated surface).
    StillRedraw { shader_time: f64 },
}

impl FrameOutcome {
    pub fn drew(&self) -> bool {
        matches!(
            self,
            FrameOutcome::Drawn { .. } | FrameOutcome::StillRedraw { .. }
        )
    }
}

/// Owns one backdrop surface: its engine, its animation clock and its
/// lifecycle from mount to teardown.
///
/// Every entry point takes `now` so the whole state machine can be driven by
/// a simulated clock.
pub struct BackdropRenderer {
    options: BackdropOptions,
    state: RenderState,
    palette: Palette,
    pending_palette: Option<Palette>,
    env: Option<Box<dyn Environment>>,
    engine: Option<Box<dyn GradientEngine>>,
    surface: Option<SurfaceSize>,
    shader_time: f64,
    frames: FrameLoop,
    pacer: FramePacer,
    resize: ResizeDebouncer,
    needs_redraw: bool,
    /// Reduced-motion preference seen by the previous callback.
    motion_reduced: bool,
    frames_drawn: u64,
}

impl BackdropRenderer {
    pub fn new(options: BackdropOptions, palette: Palette) -> Self {
        Self {
            frames: FrameLoop::new(options.tick),
            pacer: FramePacer::new(options.fps),
            resize: ResizeDebouncer::new(options.resize_debounce),
            options,
            state: RenderState::Unmounted,
            palette,
            pending_palette: None,
            env: None,
            engine: None,
            surface: None,
            shader_time: 0.0,
            needs_redraw: false,
            motion_reduced: false,
            frames_drawn: 0,
        }
    }

    pub fn options(&self) -> &BackdropOptions {
        &self.options
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn surface_size(&self) -> Option<SurfaceSize> {
        self.surface
    }

    /// Seconds of animation accumulated since mount.
    pub fn shader_time(&self) -> f64 {
        self.shader_time
    }

    /// Palette last handed to the engine (or seeded before mount).
    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn pending_palette(&self) -> Option<Palette> {
        self.pending_palette
    }

    pub fn loop_handle(&self) -> Option<AnimationLoopHandle> {
        self.frames.handle()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Sizes the surface, builds the engine through `factory`, seeds it with
    /// the current palette and starts the frame loop.
    ///
    /// An engine failure leaves the renderer in [`RenderState::Failed`]; it
    /// draws nothing but `unmount` still works.
    pub fn mount<E, F>(&mut self, env: E, now: Instant, factory: F) -> Result<(), MountError>
    where
        E: Environment + 'static,
        F: FnOnce(SurfaceSize) -> Result<Box<dyn GradientEngine>, EngineError>,
    {
        if self.state != RenderState::Unmounted {
            return Err(MountError::InvalidState(self.state));
        }
        self.state = RenderState::Initializing;

        let size = SurfaceSize::from_viewport(env.viewport_size(), env.device_pixel_ratio());
        self.motion_reduced = env.prefers_reduced_motion();
        self.env = Some(Box::new(env));

        let mut engine = match factory(size) {
            Ok(engine) => engine,
            Err(err) => {
                error!(error = %err, surface = %size, "gradient engine unavailable; backdrop disabled");
                self.state = RenderState::Failed;
                return Err(err.into());
            }
        };

        if let Some(palette) = self.pending_palette.take() {
            self.palette = palette;
        }
        engine.recolor(self.palette, Duration::ZERO, now);

        self.engine = Some(engine);
        self.surface = Some(size);
        self.shader_time = 0.0;
        self.resize.cancel();
        self.pacer.reset(now);
        self.needs_redraw = true;
        let handle = self.frames.start(now);
        self.state = RenderState::Running;
        info!(
            surface = %size,
            palette = %self.palette,
            fps = self.options.fps,
            loop_generation = handle.generation(),
            "backdrop mounted"
        );
        Ok(())
    }

    /// Queues `palette` for the next frame boundary. Before mount it simply
    /// becomes the seed palette.
    pub fn set_palette(&mut self, palette: Palette) {
        match self.state {
            RenderState::Unmounted | RenderState::Initializing => {
                self.palette = palette;
            }
            RenderState::Running => {
                if self.pending_palette.is_none() && palette == self.palette {
                    return;
                }
                if self.pending_palette.replace(palette).is_some() {
                    trace!("replaced queued palette before it reached a frame");
                }
            }
            RenderState::Failed | RenderState::Disposed => {
                debug!(state = %self.state, "ignoring palette update");
            }
        }
    }

    /// Arms the trailing-edge resize timer.
    pub fn notify_resize(&mut self, now: Instant) {
        if self.state == RenderState::Running {
            self.resize.notify(now);
        }
    }

    /// Marks the surface contents stale so the next visible callback redraws
    /// even if animation is paused.
    pub fn invalidate(&mut self) {
        if self.state == RenderState::Running {
            self.needs_redraw = true;
        }
    }

    /// Earliest instant at which [`Self::on_frame`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.state != RenderState::Running {
            return None;
        }
        match (self.frames.next_deadline(), self.resize.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Reallocates the surface once the resize quiet period has passed.
    /// Returns the new size when a reallocation happened.
    pub fn flush_resize(&mut self, now: Instant) -> Option<SurfaceSize> {
        if self.state != RenderState::Running {
            return None;
        }
        let coalesced = self.resize.take_due(now)?;
        let env = self.env.as_ref()?;
        let target = SurfaceSize::from_viewport(env.viewport_size(), env.device_pixel_ratio());
        if self.surface == Some(target) {
            trace!(surface = %target, coalesced, "resize settled on current size");
            return None;
        }

        let engine = self.engine.as_mut()?;
        match engine.resize(target) {
            Ok(()) => {
                debug!(
                    from = ?self.surface,
                    to = %target,
                    coalesced,
                    "reallocated backdrop surface"
                );
                self.surface = Some(target);
                self.needs_redraw = true;
                Some(target)
            }
            Err(err) => {
                self.handle_engine_error(err);
                None
            }
        }
    }

    /// Drives the renderer at `now`: flushes a settled resize, then runs the
    /// frame callback if it is due. The callback always reschedules itself;
    /// whether it draws depends on visibility, motion preference and pacing.
    pub fn on_frame(&mut self, now: Instant) -> FrameOutcome {
        if self.state != RenderState::Running {
            return FrameOutcome::Inactive;
        }
        self.flush_resize(now);
        if self.state != RenderState::Running {
            return FrameOutcome::Inactive;
        }

        let Some(handle) = self.frames.poll(now) else {
            return FrameOutcome::NotDue;
        };
        let outcome = self.run_frame(now);
        self.frames.reschedule(handle, now);
        trace!(?outcome, "frame callback");
        outcome
    }

    fn run_frame(&mut self, now: Instant) -> FrameOutcome {
        let Some(env) = self.env.as_ref() else {
            return FrameOutcome::Inactive;
        };
        let visible = env.is_visible();
        let reduced_motion = env.prefers_reduced_motion();
        let motion_just_stopped = reduced_motion && !self.motion_reduced;
        self.motion_reduced = reduced_motion;

        if let Some(palette) = self.pending_palette.take() {
            let transition = if reduced_motion {
                Duration::ZERO
            } else {
                self.options.transition
            };
            if let Some(engine) = self.engine.as_mut() {
                engine.recolor(palette, transition, now);
                debug!(%palette, ?transition, "recolored backdrop");
            }
            self.palette = palette;
            self.needs_redraw = true;
        } else if motion_just_stopped {
            // A fade in flight would otherwise stay frozen part way.
            if let Some(engine) = self.engine.as_mut() {
                engine.recolor(self.palette, Duration::ZERO, now);
                debug!(palette = %self.palette, "settled palette for reduced motion");
            }
            self.needs_redraw = true;
        }

        if !visible {
            self.pacer.hold(now);
            return FrameOutcome::Gated(GateReason::Hidden);
        }

        if reduced_motion {
            self.pacer.hold(now);
            return self.still_redraw(now, GateReason::ReducedMotion);
        }

        match self.pacer.try_advance(now) {
            Some(elapsed) => {
                self.shader_time += elapsed.as_secs_f64() * f64::from(self.options.speed);
                if self.draw(now) {
                    FrameOutcome::Drawn {
                        shader_time: self.shader_time,
                    }
                } else {
                    FrameOutcome::Inactive
                }
            }
            None => self.still_redraw(now, GateReason::Throttled),
        }
    }

    fn still_redraw(&mut self, now: Instant, reason: GateReason) -> FrameOutcome {
        if !self.needs_redraw {
            return FrameOutcome::Gated(reason);
        }
        if self.draw(now) {
            FrameOutcome::StillRedraw {
                shader_time: self.shader_time,
            }
        } else {
            FrameOutcome::Gated(reason)
        }
    }

    fn draw(&mut self, now: Instant) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        match engine.advance_and_draw(self.shader_time, now) {
            Ok(()) => {
                self.needs_redraw = false;
                self.frames_drawn += 1;
                true
            }
            Err(err) => {
                self.handle_engine_error(err);
                false
            }
        }
    }

    fn handle_engine_error(&mut self, err: EngineError) {
        if !err.is_fatal() {
            warn!(error = %err, "backdrop frame failed; retrying next frame");
            return;
        }
        error!(error = %err, "gradient engine lost; backdrop disabled");
        self.frames.cancel();
        self.resize.cancel();
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        self.state = RenderState::Failed;
    }

    /// Cancels the frame loop, drops any pending resize and disposes the
    /// engine. Runs at most once per mount; returns whether it did anything.
    pub fn unmount(&mut self) -> bool {
        match self.state {
            RenderState::Unmounted | RenderState::Disposed => return false,
            RenderState::Initializing | RenderState::Running | RenderState::Failed => {}
        }
        self.frames.cancel();
        self.resize.cancel();
        self.pending_palette = None;
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        self.env = None;
        self.surface = None;
        let previous = self.state;
        self.state = RenderState::Disposed;
        info!(
            from = %previous,
            frames = self.frames_drawn,
            shader_time = self.shader_time,
            "backdrop unmounted"
        );
        true
    }
}

impl Drop for BackdropRenderer {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use coverpalette::Color;

    use super::*;
    use crate::environment::StaticEnvironment;
    use crate::types::LogicalSize;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Recolor(Palette, Duration),
        Resize(SurfaceSize),
        Draw(f64),
        Dispose,
    }

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<Call>>,
        fail_draws: RefCell<Option<EngineError>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn draws(&self) -> Vec<f64> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|call| match call {
                    Call::Draw(time) => Some(*time),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.calls.borrow().iter().filter(|call| predicate(call)).count()
        }
    }

    struct FakeEngine {
        log: Rc<Recorder>,
    }

    impl GradientEngine for FakeEngine {
        fn resize(&mut self, size: SurfaceSize) -> Result<(), EngineError> {
            self.log.calls.borrow_mut().push(Call::Resize(size));
            Ok(())
        }

        fn recolor(&mut self, palette: Palette, transition: Duration, _now: Instant) {
            self.log
                .calls
                .borrow_mut()
                .push(Call::Recolor(palette, transition));
        }

        fn advance_and_draw(&mut self, shader_time: f64, _now: Instant) -> Result<(), EngineError> {
            if let Some(err) = self.log.fail_draws.borrow().clone() {
                return Err(err);
            }
            self.log.calls.borrow_mut().push(Call::Draw(shader_time));
            Ok(())
        }

        fn dispose(&mut self) {
            self.log.calls.borrow_mut().push(Call::Dispose);
        }
    }

    struct Harness {
        renderer: BackdropRenderer,
        env: Rc<StaticEnvironment>,
        log: Rc<Recorder>,
        start: Instant,
    }

    impl Harness {
        fn mount(options: BackdropOptions) -> Self {
            let env = Rc::new(StaticEnvironment::new(LogicalSize::new(800.0, 600.0), 2.0));
            let log = Rc::new(Recorder::default());
            let start = Instant::now();
            let mut renderer = BackdropRenderer::new(options, Palette::PLACEHOLDER);
            let engine_log = log.clone();
            renderer
                .mount(env.clone(), start, move |_| {
                    Ok(Box::new(FakeEngine { log: engine_log }) as Box<dyn GradientEngine>)
                })
                .expect("mount");
            Self {
                renderer,
                env,
                log,
                start,
            }
        }

        fn at(&self, millis: u64) -> Instant {
            self.start + Duration::from_millis(millis)
        }

        /// Runs every due callback up to `until_ms`, stepping in 1 ms.
        fn run_until(&mut self, until_ms: u64) -> Vec<(u64, FrameOutcome)> {
            let mut outcomes = Vec::new();
            let mut ms = 0;
            while ms <= until_ms {
                let now = self.at(ms);
                if self.renderer.next_deadline().is_some_and(|deadline| deadline <= now) {
                    outcomes.push((ms, self.renderer.on_frame(now)));
                }
                ms += 1;
            }
            outcomes
        }
    }

    fn teal() -> Palette {
        Palette::from_colors([
            Color::rgb(0x0b, 0x2a, 0x2e),
            Color::rgb(0x1f, 0x6f, 0x78),
            Color::rgb(0xe0, 0x7a, 0x1f),
            Color::rgb(0x9f, 0xe0, 0xe6),
        ])
    }

    #[test]
    fn mount_sizes_surface_and_seeds_placeholder() {
        let harness = Harness::mount(BackdropOptions::default());
        assert_eq!(harness.renderer.state(), RenderState::Running);
        assert_eq!(
            harness.renderer.surface_size(),
            Some(SurfaceSize::new(1600, 1200))
        );
        assert_eq!(
            harness.log.calls(),
            vec![Call::Recolor(Palette::PLACEHOLDER, Duration::ZERO)]
        );
        assert_eq!(
            harness.renderer.palette().to_hex(),
            ["#111111", "#222222", "#333333", "#444444"]
        );
        assert!(harness.renderer.loop_handle().is_some());
    }

    #[test]
    fn first_callback_paints_placeholder_immediately() {
        let mut harness = Harness::mount(BackdropOptions::default());
        let now = harness.start;
        assert_eq!(
            harness.renderer.on_frame(now),
            FrameOutcome::StillRedraw { shader_time: 0.0 }
        );
        assert_eq!(harness.log.draws(), vec![0.0]);
    }

    #[test]
    fn processed_frames_respect_fps_cap() {
        let mut harness = Harness::mount(BackdropOptions::default().with_fps(30.0));
        let outcomes = harness.run_until(1000);

        let drawn: Vec<u64> = outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FrameOutcome::Drawn { .. }))
            .map(|(ms, _)| *ms)
            .collect();
        assert!(drawn.len() >= 20 && drawn.len() <= 30, "{} frames", drawn.len());
        for pair in drawn.windows(2) {
            assert!(pair[1] - pair[0] >= 34, "frames {pair:?} too close");
        }
        assert!(outcomes
            .iter()
            .any(|(_, outcome)| *outcome == FrameOutcome::Gated(GateReason::Throttled)));
    }

    #[test]
    fn shader_time_tracks_elapsed_times_speed() {
        let mut harness = Harness::mount(BackdropOptions::default().with_fps(30.0).with_speed(2.0));
        harness.run_until(1000);
        let time = harness.renderer.shader_time();
        assert!(time > 1.8 && time <= 2.0, "shader time {time}");
        let draws = harness.log.draws();
        assert!(draws.windows(2).all(|pair| pair[1] >= pair[0]));
    }

    #[test]
    fn hidden_surface_keeps_rescheduling_without_drawing() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.run_until(200);
        let time_before = harness.renderer.shader_time();
        let draws_before = harness.log.draws().len();

        harness.env.set_visible(false);
        let mut ms = 201;
        let mut callbacks = 0;
        while ms <= 2000 {
            let now = harness.at(ms);
            if harness.renderer.next_deadline().is_some_and(|d| d <= now) {
                assert_eq!(
                    harness.renderer.on_frame(now),
                    FrameOutcome::Gated(GateReason::Hidden)
                );
                callbacks += 1;
            }
            ms += 1;
        }

        assert!(callbacks > 50, "loop kept ticking ({callbacks} callbacks)");
        assert_eq!(harness.renderer.shader_time(), time_before);
        assert_eq!(harness.log.draws().len(), draws_before);
        assert!(harness.renderer.next_deadline().is_some());
    }

    #[test]
    fn resuming_does_not_jump_the_clock() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.env.set_visible(false);
        harness.run_until(5000);
        harness.env.set_visible(true);
        let mut ms = 5001;
        while ms < 5200 {
            let now = harness.at(ms);
            if harness.renderer.next_deadline().is_some_and(|d| d <= now) {
                harness.renderer.on_frame(now);
            }
            ms += 1;
        }
        assert!(harness.renderer.shader_time() < 0.25);
    }

    #[test]
    fn reduced_motion_freezes_time() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.env.set_reduced_motion(true);
        let outcomes = harness.run_until(1000);
        assert_eq!(harness.renderer.shader_time(), 0.0);
        assert!(outcomes
            .iter()
            .all(|(_, outcome)| !matches!(outcome, FrameOutcome::Drawn { .. })));
    }

    #[test]
    fn palettes_before_a_frame_collapse_to_latest() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.run_until(0);

        let first = Palette::from_colors([Color::rgb(1, 2, 3); 4]);
        let second = Palette::from_colors([Color::rgb(4, 5, 6); 4]);
        harness.renderer.set_palette(first);
        harness.renderer.set_palette(second);
        harness.renderer.set_palette(teal());
        assert_eq!(harness.renderer.pending_palette(), Some(teal()));

        harness.run_until(40);
        let recolors: Vec<Call> = harness
            .log
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Recolor(..)))
            .collect();
        assert_eq!(
            recolors,
            vec![
                Call::Recolor(Palette::PLACEHOLDER, Duration::ZERO),
                Call::Recolor(teal(), Duration::from_millis(1200)),
            ]
        );
        assert_eq!(harness.renderer.palette(), teal());
        assert!(harness.renderer.pending_palette().is_none());
    }

    #[test]
    fn recolor_keeps_clock_and_surface() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.run_until(500);
        let time = harness.renderer.shader_time();
        harness.renderer.set_palette(teal());
        let now = harness.renderer.next_deadline().unwrap();
        harness.renderer.on_frame(now);
        assert!(harness.renderer.shader_time() >= time);
        assert_eq!(harness.log.count(|call| matches!(call, Call::Resize(_))), 0);
    }

    #[test]
    fn reduced_motion_recolors_instantly_with_one_still_redraw() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.env.set_reduced_motion(true);
        harness.run_until(100);
        let draws_before = harness.log.draws().len();

        harness.renderer.set_palette(teal());
        let now = harness.renderer.next_deadline().unwrap();
        assert_eq!(
            harness.renderer.on_frame(now),
            FrameOutcome::StillRedraw { shader_time: 0.0 }
        );
        assert!(harness
            .log
            .calls()
            .contains(&Call::Recolor(teal(), Duration::ZERO)));

        let later = harness.renderer.next_deadline().unwrap();
        assert_eq!(
            harness.renderer.on_frame(later),
            FrameOutcome::Gated(GateReason::ReducedMotion)
        );
        assert_eq!(harness.log.draws().len(), draws_before + 1);
    }

    #[test]
    fn reduced_motion_mid_fade_settles_on_latest_palette() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.run_until(100);
        harness.renderer.set_palette(teal());
        harness.run_until(400);
        let draws_before = harness.log.draws().len();

        harness.env.set_reduced_motion(true);
        let now = harness.renderer.next_deadline().unwrap();
        assert_eq!(
            harness.renderer.on_frame(now),
            FrameOutcome::StillRedraw {
                shader_time: harness.renderer.shader_time()
            }
        );
        assert_eq!(
            harness.log.calls().iter().rev().nth(1),
            Some(&Call::Recolor(teal(), Duration::ZERO))
        );

        let later = harness.renderer.next_deadline().unwrap();
        assert_eq!(
            harness.renderer.on_frame(later),
            FrameOutcome::Gated(GateReason::ReducedMotion)
        );
        assert_eq!(harness.log.draws().len(), draws_before + 1);
    }

    #[test]
    fn reduced_motion_from_mount_does_not_recolor_again() {
        let env = Rc::new(StaticEnvironment::default());
        env.set_reduced_motion(true);
        let log = Rc::new(Recorder::default());
        let mut renderer = BackdropRenderer::new(BackdropOptions::default(), Palette::PLACEHOLDER);
        let engine_log = log.clone();
        let start = Instant::now();
        renderer
            .mount(env, start, move |_| {
                Ok(Box::new(FakeEngine { log: engine_log }) as Box<dyn GradientEngine>)
            })
            .unwrap();
        renderer.on_frame(start);
        assert_eq!(log.count(|call| matches!(call, Call::Recolor(..))), 1);
    }

    #[test]
    fn hidden_recolor_applies_without_drawing() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.run_until(50);
        harness.env.set_visible(false);
        let draws_before = harness.log.draws().len();

        harness.renderer.set_palette(teal());
        let now = harness.renderer.next_deadline().unwrap();
        assert_eq!(
            harness.renderer.on_frame(now),
            FrameOutcome::Gated(GateReason::Hidden)
        );
        assert_eq!(harness.renderer.palette(), teal());
        assert_eq!(harness.log.draws().len(), draws_before);
    }

    #[test]
    fn resize_burst_reallocates_once() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.env.set_viewport(LogicalSize::new(1024.0, 768.0));
        for ms in [10, 30, 50, 70, 90] {
            harness.renderer.notify_resize(harness.at(ms));
        }
        harness.run_until(400);

        assert_eq!(
            harness.log.calls().iter().filter(|call| matches!(call, Call::Resize(_))).count(),
            1
        );
        assert!(harness
            .log
            .calls()
            .contains(&Call::Resize(SurfaceSize::new(2048, 1536))));
        assert_eq!(
            harness.renderer.surface_size(),
            Some(SurfaceSize::new(2048, 1536))
        );
    }

    #[test]
    fn resize_to_same_device_size_is_skipped() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.renderer.notify_resize(harness.at(5));
        harness.run_until(300);
        assert_eq!(harness.log.count(|call| matches!(call, Call::Resize(_))), 0);
    }

    #[test]
    fn pixel_ratio_change_triggers_reallocation() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.env.set_device_pixel_ratio(1.0);
        harness.renderer.notify_resize(harness.at(0));
        harness.run_until(150);
        assert_eq!(
            harness.renderer.surface_size(),
            Some(SurfaceSize::new(800, 600))
        );
    }

    #[test]
    fn no_draws_after_unmount() {
        let mut harness = Harness::mount(BackdropOptions::default());
        harness.run_until(300);
        harness.renderer.notify_resize(harness.at(300));
        assert!(harness.renderer.unmount());
        let calls_after_unmount = harness.log.calls().len();

        for ms in 300..3000 {
            assert_eq!(
                harness.renderer.on_frame(harness.at(ms)),
                FrameOutcome::Inactive
            );
        }
        assert_eq!(harness.log.calls().len(), calls_after_unmount);
        assert_eq!(harness.log.calls().last(), Some(&Call::Dispose));
        assert_eq!(harness.renderer.state(), RenderState::Disposed);
        assert!(harness.renderer.next_deadline().is_none());
        assert!(harness.renderer.loop_handle().is_none());
    }

    #[test]
    fn unmount_runs_exactly_once() {
        let mut harness = Harness::mount(BackdropOptions::default());
        assert!(harness.renderer.unmount());
        assert!(!harness.renderer.unmount());
        drop(harness.renderer);
        assert_eq!(harness.log.count(|call| *call == Call::Dispose), 1);
    }

    #[test]
    fn engine_failure_fails_closed() {
        let env = Rc::new(StaticEnvironment::default());
        let mut renderer = BackdropRenderer::new(BackdropOptions::default(), Palette::PLACEHOLDER);
        let result = renderer.mount(env, Instant::now(), |_| {
            Err(EngineError::Unavailable("no adapter".into()))
        });
        assert!(matches!(result, Err(MountError::Engine(_))));
        assert_eq!(renderer.state(), RenderState::Failed);
        assert_eq!(renderer.on_frame(Instant::now()), FrameOutcome::Inactive);
        assert!(renderer.unmount());
        assert!(!renderer.unmount());
        assert_eq!(renderer.state(), RenderState::Disposed);
    }

    #[test]
    fn lost_engine_stops_the_loop() {
        let mut harness = Harness::mount(BackdropOptions::default());
        *harness.log.fail_draws.borrow_mut() = Some(EngineError::Lost("device removed".into()));
        harness.run_until(100);
        assert_eq!(harness.renderer.state(), RenderState::Failed);
        assert!(harness.renderer.next_deadline().is_none());
        assert_eq!(harness.log.count(|call| *call == Call::Dispose), 1);
        assert!(harness.renderer.unmount());
        assert_eq!(harness.log.count(|call| *call == Call::Dispose), 1);
    }

    #[test]
    fn transient_frame_errors_keep_running() {
        let mut harness = Harness::mount(BackdropOptions::default());
        *harness.log.fail_draws.borrow_mut() = Some(EngineError::Frame("timeout".into()));
        harness.run_until(100);
        assert_eq!(harness.renderer.state(), RenderState::Running);
        *harness.log.fail_draws.borrow_mut() = None;
        harness.run_until(200);
        assert!(!harness.log.draws().is_empty());
    }

    #[test]
    fn palette_set_before_mount_seeds_engine() {
        let env = Rc::new(StaticEnvironment::default());
        let log = Rc::new(Recorder::default());
        let mut renderer = BackdropRenderer::new(BackdropOptions::default(), Palette::PLACEHOLDER);
        renderer.set_palette(teal());
        let engine_log = log.clone();
        renderer
            .mount(env, Instant::now(), move |_| {
                Ok(Box::new(FakeEngine { log: engine_log }) as Box<dyn GradientEngine>)
            })
            .unwrap();
        assert_eq!(log.calls(), vec![Call::Recolor(teal(), Duration::ZERO)]);
    }

    #[test]
    fn second_mount_is_rejected() {
        let mut harness = Harness::mount(BackdropOptions::default());
        let result = harness.renderer.mount(
            Rc::new(StaticEnvironment::default()),
            Instant::now(),
            |_| Err(EngineError::Unavailable("unused".into())),
        );
        assert!(matches!(
            result,
            Err(MountError::InvalidState(RenderState::Running))
        ));
    }
}
