//! Mesh-gradient field shared by the CPU and GPU engines.
//!
//! Four control points, one per palette slot, drift on slow Lissajous paths.
//! A pixel's color is the Gaussian-weighted mean of the four colors after a
//! gentle sine warp of its coordinates. `gpu/mesh.wgsl` mirrors these
//! constants; keep the two in sync.

use std::f64::consts::TAU;

use crate::timeline::MeshColors;

/// Gaussian sigma in normalized surface units.
pub const BASE_FALLOFF: f32 = 0.32;
const WARP_AMPLITUDE: f32 = 0.035;
const WARP_FREQUENCY: f32 = 3.0;
const MIN_WEIGHT: f32 = 1e-6;

struct Orbit {
    anchor: [f64; 2],
    amplitude: [f64; 2],
    frequency: [f64; 2],
    phase: [f64; 2],
}

const ORBITS: [Orbit; 4] = [
    Orbit {
        anchor: [0.22, 0.25],
        amplitude: [0.16, 0.12],
        frequency: [0.071, 0.053],
        phase: [0.0, 1.3],
    },
    Orbit {
        anchor: [0.78, 0.22],
        amplitude: [0.14, 0.16],
        frequency: [0.047, 0.083],
        phase: [2.1, 0.4],
    },
    Orbit {
        anchor: [0.25, 0.78],
        amplitude: [0.15, 0.13],
        frequency: [0.089, 0.061],
        phase: [4.0, 2.7],
    },
    Orbit {
        anchor: [0.75, 0.74],
        amplitude: [0.12, 0.17],
        frequency: [0.059, 0.043],
        phase: [5.2, 3.6],
    },
];

/// Control point positions in `[0, 1]²` at `time` seconds.
pub fn control_points(time: f64) -> [[f32; 2]; 4] {
    std::array::from_fn(|index| {
        let orbit = &ORBITS[index];
        let x = orbit.anchor[0]
            + orbit.amplitude[0] * ((time * orbit.frequency[0] + orbit.phase[0]) % TAU).sin();
        let y = orbit.anchor[1]
            + orbit.amplitude[1] * ((time * orbit.frequency[1] + orbit.phase[1]) % TAU).cos();
        [x as f32, y as f32]
    })
}

/// Warp phases kept small so `f32` trigonometry stays precise however long
/// the animation has been running.
pub fn warp_phase(time: f64) -> [f32; 2] {
    [
        ((time * 0.21) % TAU) as f32,
        ((time * 0.17) % TAU) as f32,
    ]
}

/// Gaussian sigma that stands in for a separate blur pass of `blur_px`
/// device pixels: blurring a Gaussian by a Gaussian adds their variances.
pub fn blurred_falloff(blur_px: f32, width: u32, height: u32) -> f32 {
    let shortest = width.min(height).max(1) as f32;
    let blur = blur_px.max(0.0) / shortest;
    (BASE_FALLOFF * BASE_FALLOFF + blur * blur).sqrt()
}

/// Everything that varies per frame, computed once before shading pixels.
#[derive(Debug, Clone, Copy)]
pub struct FrameField {
    pub points: [[f32; 2]; 4],
    pub phase: [f32; 2],
    pub falloff: f32,
}

impl FrameField {
    pub fn at(time: f64, falloff: f32) -> Self {
        Self {
            points: control_points(time),
            phase: warp_phase(time),
            falloff: falloff.max(0.01),
        }
    }

    /// sRGB color at normalized coordinates `(u, v)`.
    pub fn shade(&self, u: f32, v: f32, colors: &MeshColors) -> [f32; 3] {
        let wu = u + WARP_AMPLITUDE * (v * WARP_FREQUENCY + self.phase[0]).sin();
        let wv = v + WARP_AMPLITUDE * (u * WARP_FREQUENCY - self.phase[1]).cos();
        let denominator = 2.0 * self.falloff * self.falloff;

        let mut total = 0.0;
        let mut mixed = [0.0f32; 3];
        for (point, color) in self.points.iter().zip(colors.iter()) {
            let dx = wu - point[0];
            let dy = wv - point[1];
            let weight = (-(dx * dx + dy * dy) / denominator).exp() + MIN_WEIGHT;
            total += weight;
            for (channel, value) in mixed.iter_mut().zip(color.iter()) {
                *channel += weight * value;
            }
        }
        mixed.map(|channel| (channel / total).clamp(0.0, 1.0))
    }
}
