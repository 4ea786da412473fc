use bytemuck::{Pod, Zeroable};

use crate::mesh::FrameField;
use crate::timeline::MeshColors;
use crate::types::SurfaceSize;

/// Mirrors the `Backdrop` struct in `mesh.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct BackdropUniforms {
    /// Width, height, and their reciprocals.
    pub resolution: [f32; 4],
    /// Control points in `xy`; `zw` unused.
    pub points: [[f32; 4]; 4],
    /// sRGB palette slots in `rgb`.
    pub colors: [[f32; 4]; 4],
    /// Warp phases, falloff, and 1.0 when the surface wants linear output.
    pub params: [f32; 4],
}

impl BackdropUniforms {
    pub fn new(size: SurfaceSize, linear_output: bool) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.set_resolution(size);
        uniforms.params[3] = if linear_output { 1.0 } else { 0.0 };
        uniforms
    }

    pub fn set_resolution(&mut self, size: SurfaceSize) {
        let width = size.width.max(1) as f32;
        let height = size.height.max(1) as f32;
        self.resolution = [width, height, 1.0 / width, 1.0 / height];
    }

    pub fn set_frame(&mut self, field: &FrameField, colors: &MeshColors) {
        for (slot, point) in self.points.iter_mut().zip(field.points.iter()) {
            *slot = [point[0], point[1], 0.0, 0.0];
        }
        for (slot, color) in self.colors.iter_mut().zip(colors.iter()) {
            *slot = [color[0], color[1], color[2], 1.0];
        }
        self.params[0] = field.phase[0];
        self.params[1] = field.phase[1];
        self.params[2] = field.falloff;
    }
}
