use std::time::{Duration, Instant};

use coverpalette::Palette;

use crate::types::CrossfadeCurve;

/// Four palette slots as sRGB floats in `[0, 1]`.
pub type MeshColors = [[f32; 3]; 4];

impl CrossfadeCurve {
    /// Maps linear fade progress onto the blend weight of the new palette.
    pub fn ease(self, progress: f32) -> f32 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            CrossfadeCurve::Linear => p,
            CrossfadeCurve::Smoothstep => p * p * (3.0 - 2.0 * p),
            CrossfadeCurve::EaseInOut if p < 0.5 => 2.0 * p * p,
            CrossfadeCurve::EaseInOut => {
                let rest = 2.0 - 2.0 * p;
                1.0 - rest * rest / 2.0
            }
        }
    }
}

/// A running fade: when it began and how long it lasts.
struct Fade {
    began: Instant,
    length: Duration,
}

impl Fade {
    fn begin(length: Duration, now: Instant) -> Option<Self> {
        (!length.is_zero()).then_some(Self { began: now, length })
    }

    /// Linear progress in `[0, 1]`, saturating once the fade is over.
    fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.began);
        (elapsed.as_secs_f32() / self.length.as_secs_f32()).min(1.0)
    }
}

pub fn palette_colors(palette: &Palette) -> MeshColors {
    palette.colors().map(|color| {
        let srgb = color.to_srgb();
        [srgb.red, srgb.green, srgb.blue]
    })
}

/// Cross-fade between palettes driven by wall-clock instants.
///
/// Retargeting mid-fade starts from whatever blend is currently shown.
pub struct PaletteTransition {
    curve: CrossfadeCurve,
    from: MeshColors,
    to: MeshColors,
    target: Palette,
    fade: Option<Fade>,
}

impl PaletteTransition {
    pub fn new(palette: Palette, curve: CrossfadeCurve) -> Self {
        let colors = palette_colors(&palette);
        Self {
            curve,
            from: colors,
            to: colors,
            target: palette,
            fade: None,
        }
    }

    pub fn target(&self) -> Palette {
        self.target
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn retarget(&mut self, palette: Palette, duration: Duration, now: Instant) {
        self.from = self.sample(now);
        self.to = palette_colors(&palette);
        self.target = palette;
        self.fade = Fade::begin(duration, now);
        if self.fade.is_none() {
            self.from = self.to;
        }
    }

    /// Colors to draw at `now`; a finished fade collapses onto its target.
    pub fn sample(&mut self, now: Instant) -> MeshColors {
        let Some(fade) = &self.fade else {
            return self.to;
        };
        let progress = fade.progress(now);
        if progress >= 1.0 {
            self.fade = None;
            self.from = self.to;
            return self.to;
        }
        let mix = self.curve.ease(progress);
        std::array::from_fn(|slot| {
            std::array::from_fn(|channel| {
                let a = self.from[slot][channel];
                let b = self.to[slot][channel];
                a + (b - a) * mix
            })
        })
    }
}
