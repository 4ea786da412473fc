//! wgpu implementation of the gradient engine.
//!
//! - `context` owns the instance, device and surface and reconfigures the
//!   swapchain on resize.
//! - `pipeline` builds the full-screen mesh pipeline from `mesh.wgsl`.
//! - `uniforms` packs one frame of the mesh field for the shader.
//! - `state` ties them together behind [`WgpuEngine`].
//!
//! Control points are evaluated on the CPU through [`crate::mesh`], so the
//! shader only mirrors the per-pixel shading.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub use state::{GpuOptions, WgpuEngine};
