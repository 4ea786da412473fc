use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use coverpalette::Palette;
use tracing::{debug, error, info, trace};
use winit::dpi::LogicalSize as WinitLogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::engine::GradientEngine;
use crate::environment::Environment;
use crate::gpu::{GpuOptions, WgpuEngine};
use crate::renderer::BackdropRenderer;
use crate::types::{BackdropOptions, LogicalSize};

/// Supplies palettes to a running window, typically by watching covers.
pub trait PaletteSource {
    /// Returns a palette when the source has something new to show.
    fn poll(&mut self, now: Instant) -> Option<Palette>;

    /// When `poll` next needs to run, if ever.
    fn next_deadline(&self) -> Option<Instant>;

    /// The viewer asked to move on to the next cover.
    fn advance(&mut self, _now: Instant) {}
}

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub reduced_motion: bool,
    /// Adapter selection; blur and curve come from [`BackdropOptions`].
    pub gpu: GpuOptions,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "coverglow".to_string(),
            width: 1280.0,
            height: 720.0,
            reduced_motion: false,
            gpu: GpuOptions::default(),
        }
    }
}

/// Host facts read from a live winit window.
pub struct WindowEnvironment {
    window: Arc<Window>,
    occluded: Cell<bool>,
    reduced_motion: Cell<bool>,
}

impl WindowEnvironment {
    pub fn new(window: Arc<Window>, reduced_motion: bool) -> Self {
        Self {
            window,
            occluded: Cell::new(false),
            reduced_motion: Cell::new(reduced_motion),
        }
    }

    pub fn set_occluded(&self, occluded: bool) {
        self.occluded.set(occluded);
    }

    pub fn toggle_reduced_motion(&self) -> bool {
        let reduced = !self.reduced_motion.get();
        self.reduced_motion.set(reduced);
        reduced
    }
}

impl Environment for WindowEnvironment {
    fn is_visible(&self) -> bool {
        !self.occluded.get()
            && self.window.is_visible().unwrap_or(true)
            && !self.window.is_minimized().unwrap_or(false)
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion.get()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.scale_factor()
    }

    fn viewport_size(&self) -> LogicalSize {
        let scale = self.window.scale_factor();
        let size = self.window.inner_size().to_logical::<f64>(scale);
        LogicalSize::new(size.width, size.height)
    }
}

/// Opens a window, mounts a GPU backdrop in it and feeds it palettes from
/// `source` until the window closes.
///
/// Space advances the source, `m` toggles reduced motion and Escape quits.
pub fn run_window<S>(
    options: WindowOptions,
    backdrop: BackdropOptions,
    initial: Palette,
    mut source: S,
) -> Result<()>
where
    S: PaletteSource,
{
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(options.title.as_str())
        .with_inner_size(WinitLogicalSize::new(options.width, options.height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let env = Rc::new(WindowEnvironment::new(window.clone(), options.reduced_motion));
    let gpu = GpuOptions {
        blur: backdrop.blur,
        curve: backdrop.curve,
        ..options.gpu
    };
    let mut renderer = BackdropRenderer::new(backdrop, initial);
    let engine_window = window.clone();
    renderer
        .mount(env.clone(), Instant::now(), move |size| {
            let engine = WgpuEngine::new(engine_window, size, initial, gpu)?;
            Ok(Box::new(engine) as Box<dyn GradientEngine>)
        })
        .context("failed to start backdrop")?;

    let mut failure = None;
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                renderer.notify_resize(Instant::now());
            }
            WindowEvent::Occluded(occluded) => {
                debug!(occluded, "window occlusion changed");
                env.set_occluded(occluded);
                if !occluded {
                    renderer.invalidate();
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => elwt.exit(),
                    Key::Named(NamedKey::Space) => source.advance(Instant::now()),
                    Key::Character(ref value) if value.as_str() == "m" => {
                        let reduced = env.toggle_reduced_motion();
                        info!(reduced_motion = reduced, "toggled reduced motion");
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                let outcome = renderer.on_frame(Instant::now());
                if !outcome.drew() {
                    trace!(?outcome, "redraw skipped");
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if let Some(palette) = source.poll(now) {
                renderer.set_palette(palette);
            }

            if !renderer.state().is_live() {
                failure = Some(anyhow!("backdrop renderer is {}", renderer.state()));
                elwt.exit();
                return;
            }

            let mut redraw_pending = false;
            if renderer.next_deadline().is_some_and(|deadline| deadline <= now) {
                if env.is_visible() {
                    window.request_redraw();
                    redraw_pending = true;
                } else {
                    // Hidden windows may never see RedrawRequested.
                    renderer.on_frame(now);
                }
            }

            let deadline = [renderer.next_deadline(), source.next_deadline()]
                .into_iter()
                .flatten()
                .min();
            match deadline {
                Some(deadline) if !redraw_pending => {
                    trace!(
                        wait_ms = deadline.saturating_duration_since(now).as_millis(),
                        "waiting for next deadline"
                    );
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                }
                _ => elwt.set_control_flow(ControlFlow::Wait),
            }
        }
        Event::LoopExiting => {
            renderer.unmount();
        }
        _ => {}
    });

    if let Err(err) = run_result {
        error!(error = %err, "window event loop error");
        return Err(anyhow!("window event loop error: {err}"));
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
