use std::sync::Arc;
use std::time::{Duration, Instant};

use coverpalette::Palette;
use tracing::{debug, warn};
use winit::window::Window;

use crate::engine::{EngineError, GradientEngine};
use crate::mesh::{blurred_falloff, FrameField};
use crate::timeline::PaletteTransition;
use crate::types::{CrossfadeCurve, SurfaceSize};

use super::context::GpuContext;
use super::pipeline::MeshPipeline;
use super::uniforms::BackdropUniforms;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuOptions {
    /// Blur radius in logical pixels, folded into the Gaussian falloff.
    pub blur: f32,
    pub curve: CrossfadeCurve,
    pub power_preference: wgpu::PowerPreference,
    /// Ask wgpu for its software adapter instead of real hardware.
    pub force_fallback_adapter: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            blur: 80.0,
            curve: CrossfadeCurve::default(),
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
        }
    }
}

impl GpuOptions {
    /// Blur radius in device pixels at `scale_factor`.
    pub fn device_blur(&self, scale_factor: f64) -> f32 {
        (f64::from(self.blur.max(0.0)) * scale_factor.max(0.0)) as f32
    }
}

struct GpuResources {
    context: GpuContext,
    pipeline: MeshPipeline,
}

/// Draws the mesh gradient straight into a window surface.
pub struct WgpuEngine {
    window: Arc<Window>,
    resources: Option<GpuResources>,
    uniforms: BackdropUniforms,
    transition: PaletteTransition,
    options: GpuOptions,
    /// Device-pixel blur for the current scale factor.
    blur: f32,
}

impl WgpuEngine {
    pub fn new(
        window: Arc<Window>,
        size: SurfaceSize,
        palette: Palette,
        options: GpuOptions,
    ) -> Result<Self, EngineError> {
        let context = GpuContext::new(
            window.clone(),
            size,
            options.power_preference,
            options.force_fallback_adapter,
        )
        .map_err(|err| EngineError::Unavailable(format!("{err:#}")))?;
        let pipeline = MeshPipeline::new(&context.device, context.config.format);
        let uniforms = BackdropUniforms::new(size, context.encodes_srgb);
        let blur = options.device_blur(window.scale_factor());
        debug!(surface = %size, format = ?context.config.format, blur, "created GPU gradient engine");
        Ok(Self {
            window,
            resources: Some(GpuResources { context, pipeline }),
            uniforms,
            transition: PaletteTransition::new(palette, options.curve),
            options,
            blur,
        })
    }
}

impl GradientEngine for WgpuEngine {
    fn resize(&mut self, size: SurfaceSize) -> Result<(), EngineError> {
        let gpu = self.resources.as_mut().ok_or(EngineError::Disposed)?;
        gpu.context.resize(size);
        self.uniforms.set_resolution(gpu.context.size());
        self.blur = self.options.device_blur(self.window.scale_factor());
        Ok(())
    }

    fn recolor(&mut self, palette: Palette, transition: Duration, now: Instant) {
        self.transition.retarget(palette, transition, now);
    }

    fn advance_and_draw(&mut self, shader_time: f64, now: Instant) -> Result<(), EngineError> {
        let gpu = self.resources.as_mut().ok_or(EngineError::Disposed)?;

        let frame = match gpu.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.context.reconfigure();
                return Err(EngineError::Frame("surface outdated; reconfigured".into()));
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(EngineError::Lost("surface out of memory".into()));
            }
            Err(other) => {
                warn!(error = ?other, "failed to acquire surface texture");
                return Err(EngineError::Frame(other.to_string()));
            }
        };

        let size = gpu.context.size();
        let falloff = blurred_falloff(self.blur, size.width, size.height);
        let field = FrameField::at(shader_time, falloff);
        let colors = self.transition.sample(now);
        self.uniforms.set_frame(&field, &colors);
        gpu.pipeline.write_uniforms(&gpu.context.queue, &self.uniforms);

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("backdrop encoder"),
            });
        gpu.pipeline.encode(&mut encoder, &view);
        gpu.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn dispose(&mut self) {
        if self.resources.take().is_some() {
            debug!("released GPU gradient engine");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_follows_scale_factor() {
        let options = GpuOptions {
            blur: 40.0,
            ..GpuOptions::default()
        };
        assert_eq!(options.device_blur(1.0), 40.0);
        assert_eq!(options.device_blur(2.0), 80.0);
        assert_eq!(options.device_blur(1.5), 60.0);
    }

    #[test]
    fn negative_blur_collapses_to_zero() {
        let options = GpuOptions {
            blur: -5.0,
            ..GpuOptions::default()
        };
        assert_eq!(options.device_blur(2.0), 0.0);
    }
}
