use std::fmt;
use std::time::Duration;

/// Backing-store dimensions in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Device-pixel size for a logical viewport at the given pixel ratio.
    /// Each side is rounded and never drops below one pixel.
    pub fn from_viewport(viewport: LogicalSize, device_pixel_ratio: f64) -> Self {
        let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        let scale = |value: f64| (value.max(0.0) * ratio).round().clamp(1.0, u32::MAX as f64) as u32;
        Self::new(scale(viewport.width), scale(viewport.height))
    }

    pub fn scaled(self, factor: f32) -> Self {
        let scale = |value: u32| ((value as f32 * factor).ceil() as u32).max(1);
        Self::new(scale(self.width), scale(self.height))
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Viewport size in logical (CSS-style) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalSize {
    pub width: f64,
    pub height: f64,
}

impl LogicalSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Easing shape applied while cross-fading from one palette to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfadeCurve {
    Linear,
    #[default]
    Smoothstep,
    EaseInOut,
}

/// Lifecycle of a [`crate::BackdropRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Unmounted,
    Initializing,
    Running,
    /// Engine could not be created or died; nothing is drawn until unmount.
    Failed,
    Disposed,
}

impl RenderState {
    pub fn is_live(self) -> bool {
        matches!(self, RenderState::Initializing | RenderState::Running)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RenderState::Unmounted => "unmounted",
            RenderState::Initializing => "initializing",
            RenderState::Running => "running",
            RenderState::Failed => "failed",
            RenderState::Disposed => "disposed",
        };
        f.write_str(label)
    }
}

/// Immutable configuration handed to the renderer at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BackdropOptions {
    /// Blur radius in logical pixels.
    pub blur: f32,
    /// Cap on processed frames per second; `<= 0` means uncapped.
    pub fps: f32,
    /// Multiplier applied to elapsed wall-clock time.
    pub speed: f32,
    /// Length of the palette cross-fade.
    pub transition: Duration,
    pub curve: CrossfadeCurve,
    /// Trailing-edge window for coalescing resize notifications.
    pub resize_debounce: Duration,
    /// Cadence of the repeating frame callback.
    pub tick: Duration,
}

impl BackdropOptions {
    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

impl Default for BackdropOptions {
    fn default() -> Self {
        Self {
            blur: 80.0,
            fps: 30.0,
            speed: 1.0,
            transition: Duration::from_millis(1200),
            curve: CrossfadeCurve::default(),
            resize_debounce: Duration::from_millis(100),
            tick: Duration::from_secs_f64(1.0 / 60.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_scales_by_pixel_ratio() {
        let size = SurfaceSize::from_viewport(LogicalSize::new(1280.0, 720.0), 2.0);
        assert_eq!(size, SurfaceSize::new(2560, 1440));
        let fractional = SurfaceSize::from_viewport(LogicalSize::new(1366.0, 768.0), 1.25);
        assert_eq!(fractional, SurfaceSize::new(1708, 960));
    }

    #[test]
    fn degenerate_inputs_clamp_to_one_pixel() {
        let size = SurfaceSize::from_viewport(LogicalSize::new(0.0, -5.0), f64::NAN);
        assert_eq!(size, SurfaceSize::new(1, 1));
        assert_eq!(SurfaceSize::new(3, 1).scaled(0.25), SurfaceSize::new(1, 1));
    }
}
