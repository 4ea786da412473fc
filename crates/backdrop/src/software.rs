use std::time::{Duration, Instant};

use coverpalette::Palette;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::engine::{EngineError, GradientEngine};
use crate::mesh::{FrameField, BASE_FALLOFF};
use crate::timeline::PaletteTransition;
use crate::types::{CrossfadeCurve, SurfaceSize};

/// Below this sigma the blur pass is skipped.
const MIN_BLUR_SIGMA: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftwareOptions {
    /// Blur radius in device pixels of the full-size surface.
    pub blur: f32,
    /// Fraction of the surface resolution actually rasterized.
    pub internal_scale: f32,
    pub curve: CrossfadeCurve,
}

impl Default for SoftwareOptions {
    fn default() -> Self {
        Self {
            blur: 80.0,
            internal_scale: 0.25,
            curve: CrossfadeCurve::default(),
        }
    }
}

/// CPU rasterizer for the mesh gradient.
///
/// Renders at `internal_scale` of the surface and blurs there, which keeps a
/// large blur radius affordable; `snapshot` scales the raster back up.
pub struct SoftwareEngine {
    options: SoftwareOptions,
    surface: SurfaceSize,
    raster: RgbaImage,
    transition: PaletteTransition,
    frames_drawn: u64,
    disposed: bool,
}

impl SoftwareEngine {
    pub fn new(
        surface: SurfaceSize,
        palette: Palette,
        options: SoftwareOptions,
    ) -> Result<Self, EngineError> {
        if !(options.internal_scale > 0.0 && options.internal_scale <= 1.0) {
            return Err(EngineError::Unavailable(format!(
                "internal scale {} outside (0, 1]",
                options.internal_scale
            )));
        }
        let raster_size = surface.scaled(options.internal_scale);
        debug!(%surface, raster = %raster_size, "created software gradient engine");
        Ok(Self {
            options,
            surface,
            raster: RgbaImage::new(raster_size.width, raster_size.height),
            transition: PaletteTransition::new(palette, options.curve),
            frames_drawn: 0,
            disposed: false,
        })
    }

    pub fn surface_size(&self) -> SurfaceSize {
        self.surface
    }

    /// The reduced-resolution buffer last drawn.
    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn palette(&self) -> Palette {
        self.transition.target()
    }

    /// Last frame upscaled to the full surface size.
    pub fn snapshot(&self) -> RgbaImage {
        imageops::resize(
            &self.raster,
            self.surface.width,
            self.surface.height,
            FilterType::Triangle,
        )
    }

    fn blur_sigma(&self) -> f32 {
        self.options.blur.max(0.0) * self.options.internal_scale
    }

    fn rasterize(&mut self, shader_time: f64, now: Instant) {
        let colors = self.transition.sample(now);
        let field = FrameField::at(shader_time, BASE_FALLOFF);
        let width = self.raster.width().max(1) as f32;
        let height = self.raster.height().max(1) as f32;
        for (x, y, pixel) in self.raster.enumerate_pixels_mut() {
            let u = (x as f32 + 0.5) / width;
            let v = (y as f32 + 0.5) / height;
            let [r, g, b] = field.shade(u, v, &colors);
            *pixel = Rgba([to_byte(r), to_byte(g), to_byte(b), 255]);
        }

        let sigma = self.blur_sigma();
        if sigma >= MIN_BLUR_SIGMA {
            self.raster = imageops::blur(&self.raster, sigma);
        }
    }
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl GradientEngine for SoftwareEngine {
    fn resize(&mut self, size: SurfaceSize) -> Result<(), EngineError> {
        if self.disposed {
            return Err(EngineError::Disposed);
        }
        let raster_size = size.scaled(self.options.internal_scale);
        self.surface = size;
        self.raster = RgbaImage::new(raster_size.width, raster_size.height);
        debug!(surface = %size, raster = %raster_size, "resized software raster");
        Ok(())
    }

    fn recolor(&mut self, palette: Palette, transition: Duration, now: Instant) {
        self.transition.retarget(palette, transition, now);
    }

    fn advance_and_draw(&mut self, shader_time: f64, now: Instant) -> Result<(), EngineError> {
        if self.disposed {
            return Err(EngineError::Disposed);
        }
        self.rasterize(shader_time, now);
        self.frames_drawn += 1;
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.raster = RgbaImage::new(0, 0);
        }
    }
}
