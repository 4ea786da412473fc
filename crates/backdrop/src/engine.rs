use std::time::{Duration, Instant};

use coverpalette::Palette;

use crate::types::SurfaceSize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be created for this surface.
    #[error("gradient engine unavailable: {0}")]
    Unavailable(String),
    /// A single frame failed; the next frame may succeed.
    #[error("frame skipped: {0}")]
    Frame(String),
    /// The engine cannot draw again.
    #[error("gradient engine lost: {0}")]
    Lost(String),
    #[error("gradient engine already disposed")]
    Disposed,
}

impl EngineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Lost(_) | EngineError::Disposed)
    }
}

/// A procedural gradient bound to one drawing surface.
pub trait GradientEngine {
    /// Reallocates the backing store for new device-pixel dimensions.
    fn resize(&mut self, size: SurfaceSize) -> Result<(), EngineError>;

    /// Swaps the palette in place, cross-fading over `transition`.
    fn recolor(&mut self, palette: Palette, transition: Duration, now: Instant);

    /// Draws one frame at `shader_time` seconds of animation.
    fn advance_and_draw(&mut self, shader_time: f64, now: Instant) -> Result<(), EngineError>;

    /// Releases every resource. Later calls are no-ops.
    fn dispose(&mut self);
}
