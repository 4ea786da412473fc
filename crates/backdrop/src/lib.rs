//! Animated mesh-gradient backdrop driven by a four-color palette.
//!
//! The crate separates the lifecycle from the pixels:
//!
//! ```text
//!   host (winit window, tests, still export)
//!          │ Environment: visibility, reduced motion, DPR, viewport
//!          ▼
//!   BackdropRenderer ── FrameLoop ──▶ on_frame() ──▶ FramePacer gate
//!          │                 ▲               │
//!          │ ResizeDebouncer ┘               ▼
//!          └──────────────────────▶ dyn GradientEngine
//!                                     ├─ WgpuEngine     (window surface)
//!                                     └─ SoftwareEngine (CPU raster)
//! ```
//!
//! `BackdropRenderer` owns one mount: it sizes the surface from the viewport
//! and pixel ratio, keeps a single self-rescheduling frame callback alive,
//! batches palette changes to the next frame boundary and tears everything
//! down exactly once. Engines only know how to resize, recolor and draw.
//! All timing goes through caller-supplied `Instant`s.

mod engine;
mod environment;
mod frame_loop;
mod gpu;
pub mod mesh;
mod pacer;
mod renderer;
mod resize;
mod software;
mod timeline;
mod types;
mod window;

pub use engine::{EngineError, GradientEngine};
pub use environment::{Environment, StaticEnvironment};
pub use frame_loop::{AnimationLoopHandle, FrameLoop};
pub use gpu::{GpuOptions, WgpuEngine};
pub use pacer::FramePacer;
pub use renderer::{BackdropRenderer, FrameOutcome, GateReason, MountError};
pub use resize::ResizeDebouncer;
pub use software::{SoftwareEngine, SoftwareOptions};
pub use timeline::{palette_colors, MeshColors, PaletteTransition};
pub use types::{BackdropOptions, CrossfadeCurve, LogicalSize, RenderState, SurfaceSize};
pub use window::{run_window, PaletteSource, WindowEnvironment, WindowOptions};
