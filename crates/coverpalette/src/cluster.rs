use image::RgbaImage;

use crate::color::Color;

/// Bits kept per channel when bucketing pixels.
const SIGBITS: u32 = 5;
const RSHIFT: u32 = 8 - SIGBITS;
const SIDE: usize = 1 << SIGBITS;
const HISTO_SIZE: usize = SIDE * SIDE * SIDE;
const MAX_ITERATIONS: usize = 1000;
/// Share of the target box count reached by splitting on population alone;
/// the rest is split by population × volume.
const FRACT_BY_POPULATION: f32 = 0.75;
const MIN_ALPHA: u8 = 125;
const NEAR_WHITE: u8 = 250;

pub const DEFAULT_CLUSTER_COUNT: usize = 7;
pub const DEFAULT_QUALITY: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    #[error("image has no usable pixels (all transparent or near-white)")]
    NoUsablePixels,
    #[error("clustering produced no colors")]
    Empty,
    #[error("custom extractor failed: {0}")]
    Custom(String),
}

/// Representative colors of a bitmap, most populous first when produced by
/// [`MedianCut`]. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClusterSet {
    colors: Vec<Color>,
}

impl RawClusterSet {
    pub fn new(colors: Vec<Color>) -> Result<Self, ClusterError> {
        if colors.is_empty() {
            return Err(ClusterError::Empty);
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Replaceable clustering step of the extraction pipeline.
pub trait Clusterer {
    fn clusters(&mut self, image: &RgbaImage) -> Result<RawClusterSet, ClusterError>;
}

impl<F> Clusterer for F
where
    F: FnMut(&RgbaImage) -> Result<Vec<Color>, ClusterError>,
{
    fn clusters(&mut self, image: &RgbaImage) -> Result<RawClusterSet, ClusterError> {
        RawClusterSet::new(self(image)?)
    }
}

/// Modified median-cut quantizer.
///
/// The histogram buffer is kept between calls so repeated extractions do not
/// reallocate it.
#[derive(Debug, Clone)]
pub struct MedianCut {
    max_colors: usize,
    quality: u32,
    histogram: Vec<u32>,
}

impl MedianCut {
    /// `quality` is the pixel sampling stride; `1` visits every pixel.
    pub fn new(max_colors: usize, quality: u32) -> Self {
        Self {
            max_colors: max_colors.max(1),
            quality: quality.max(1),
            histogram: vec![0; HISTO_SIZE],
        }
    }

    fn fill_histogram(&mut self, image: &RgbaImage) -> Option<VBox> {
        self.histogram.fill(0);
        let mut bounds: Option<VBox> = None;

        for pixel in image.pixels().step_by(self.quality as usize) {
            let [r, g, b, a] = pixel.0;
            if a < MIN_ALPHA || (r > NEAR_WHITE && g > NEAR_WHITE && b > NEAR_WHITE) {
                continue;
            }
            let (qr, qg, qb) = (r >> RSHIFT, g >> RSHIFT, b >> RSHIFT);
            self.histogram[histo_index(qr, qg, qb)] += 1;
            match bounds.as_mut() {
                Some(vbox) => vbox.include(qr, qg, qb),
                None => bounds = Some(VBox::point(qr, qg, qb)),
            }
        }

        bounds.map(|mut vbox| {
            vbox.count = vbox.population(&self.histogram);
            vbox
        })
    }

    fn split_until(&self, boxes: &mut Vec<VBox>, target: usize, by_volume: bool) {
        let mut iterations = 0;
        while boxes.len() < target && iterations < MAX_ITERATIONS {
            iterations += 1;
            let candidate = boxes
                .iter()
                .enumerate()
                .filter(|(_, vbox)| vbox.splittable())
                .max_by_key(|(_, vbox)| {
                    if by_volume {
                        u64::from(vbox.count) * u64::from(vbox.volume())
                    } else {
                        u64::from(vbox.count)
                    }
                })
                .map(|(index, _)| index);
            let Some(index) = candidate else {
                break;
            };

            let vbox = boxes.swap_remove(index);
            match vbox.split(&self.histogram) {
                Some((left, right)) => {
                    boxes.push(left);
                    boxes.push(right);
                }
                None => {
                    boxes.push(vbox);
                    break;
                }
            }
        }
    }
}

impl Default for MedianCut {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_COUNT, DEFAULT_QUALITY)
    }
}

impl Clusterer for MedianCut {
    fn clusters(&mut self, image: &RgbaImage) -> Result<RawClusterSet, ClusterError> {
        let initial = self
            .fill_histogram(image)
            .ok_or(ClusterError::NoUsablePixels)?;

        let mut boxes = vec![initial];
        let by_population = ((self.max_colors as f32) * FRACT_BY_POPULATION).ceil() as usize;
        self.split_until(&mut boxes, by_population.max(1), false);
        self.split_until(&mut boxes, self.max_colors, true);

        boxes.sort_by(|a, b| b.count.cmp(&a.count));
        let colors = boxes
            .iter()
            .map(|vbox| vbox.average(&self.histogram))
            .collect();
        RawClusterSet::new(colors)
    }
}

fn histo_index(r: u8, g: u8, b: u8) -> usize {
    ((r as usize) << (2 * SIGBITS)) | ((g as usize) << SIGBITS) | b as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Red,
    Green,
    Blue,
}

/// Axis-aligned box in quantized color space; bounds are inclusive and
/// always tight around the occupied cells.
#[derive(Debug, Clone, Copy)]
struct VBox {
    min: [u8; 3],
    max: [u8; 3],
    count: u32,
}

impl VBox {
    fn point(r: u8, g: u8, b: u8) -> Self {
        Self {
            min: [r, g, b],
            max: [r, g, b],
            count: 0,
        }
    }

    fn include(&mut self, r: u8, g: u8, b: u8) {
        for (axis, value) in [r, g, b].into_iter().enumerate() {
            self.min[axis] = self.min[axis].min(value);
            self.max[axis] = self.max[axis].max(value);
        }
    }

    fn width(&self, axis: usize) -> u32 {
        u32::from(self.max[axis] - self.min[axis]) + 1
    }

    fn volume(&self) -> u32 {
        self.width(0) * self.width(1) * self.width(2)
    }

    fn splittable(&self) -> bool {
        self.count >= 2 && self.volume() > 1
    }

    fn cells(&self) -> impl Iterator<Item = (u8, u8, u8)> + '_ {
        (self.min[0]..=self.max[0]).flat_map(move |r| {
            (self.min[1]..=self.max[1])
                .flat_map(move |g| (self.min[2]..=self.max[2]).map(move |b| (r, g, b)))
        })
    }

    fn population(&self, histogram: &[u32]) -> u32 {
        self.cells()
            .map(|(r, g, b)| histogram[histo_index(r, g, b)])
            .sum()
    }

    fn longest_axis(&self) -> Axis {
        let (r, g, b) = (self.width(0), self.width(1), self.width(2));
        if r >= g && r >= b {
            Axis::Red
        } else if g >= b {
            Axis::Green
        } else {
            Axis::Blue
        }
    }

    /// Shrinks the bounds to the occupied cells; `None` when nothing is inside.
    fn tightened(&self, histogram: &[u32]) -> Option<VBox> {
        let mut result: Option<VBox> = None;
        let mut count = 0;
        for (r, g, b) in self.cells() {
            let cell = histogram[histo_index(r, g, b)];
            if cell == 0 {
                continue;
            }
            count += cell;
            match result.as_mut() {
                Some(vbox) => vbox.include(r, g, b),
                None => result = Some(VBox::point(r, g, b)),
            }
        }
        result.map(|mut vbox| {
            vbox.count = count;
            vbox
        })
    }

    fn split(&self, histogram: &[u32]) -> Option<(VBox, VBox)> {
        if !self.splittable() {
            return None;
        }

        let axis = self.longest_axis();
        let index = axis as usize;
        let (lo, hi) = (self.min[index], self.max[index]);
        if lo == hi {
            return None;
        }

        let mut running = 0;
        let mut cut = hi - 1;
        for slice in lo..=hi {
            let mut slab = *self;
            slab.min[index] = slice;
            slab.max[index] = slice;
            running += slab.population(histogram);
            if running * 2 >= self.count {
                cut = slice.min(hi - 1);
                break;
            }
        }

        let mut left = *self;
        left.max[index] = cut;
        let mut right = *self;
        right.min[index] = cut + 1;

        Some((left.tightened(histogram)?, right.tightened(histogram)?))
    }

    fn average(&self, histogram: &[u32]) -> Color {
        let mult = f64::from(1u32 << RSHIFT);
        let mut total = 0.0;
        let mut sums = [0.0f64; 3];
        for (r, g, b) in self.cells() {
            let weight = f64::from(histogram[histo_index(r, g, b)]);
            if weight == 0.0 {
                continue;
            }
            total += weight;
            for (sum, value) in sums.iter_mut().zip([r, g, b]) {
                *sum += weight * (f64::from(value) + 0.5) * mult;
            }
        }

        if total == 0.0 {
            let centre = |axis: usize| {
                let mid = (f64::from(self.min[axis]) + f64::from(self.max[axis]) + 1.0) / 2.0;
                (mid * mult).min(255.0) as u8
            };
            return Color::rgb(centre(0), centre(1), centre(2));
        }

        let channel = |sum: f64| (sum / total).round().clamp(0.0, 255.0) as u8;
        Color::rgb(channel(sums[0]), channel(sums[1]), channel(sums[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn striped(colors: &[[u8; 3]], stripe: u32) -> RgbaImage {
        let width = stripe * colors.len() as u32;
        RgbaImage::from_fn(width, 8, |x, _| {
            let [r, g, b] = colors[(x / stripe) as usize];
            Rgba([r, g, b, 255])
        })
    }

    #[test]
    fn separates_distinct_colors() {
        let image = striped(&[[200, 20, 20], [20, 20, 200], [20, 160, 40]], 16);
        let mut engine = MedianCut::new(7, 1);
        let clusters = engine.clusters(&image).unwrap();
        assert_eq!(clusters.len(), 3);
        for expected in [Color::rgb(200, 20, 20), Color::rgb(20, 20, 200)] {
            assert!(
                clusters.colors().iter().any(|c| c.distance(expected) < 5.0),
                "missing {expected} in {:?}",
                clusters.colors()
            );
        }
    }

    #[test]
    fn caps_cluster_count() {
        let image = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255])
        });
        let mut engine = MedianCut::new(7, 1);
        let clusters = engine.clusters(&image).unwrap();
        assert!(clusters.len() <= 7);
        assert!(clusters.len() >= 6);
    }

    #[test]
    fn orders_by_population() {
        let mut image = striped(&[[30, 60, 200]], 48);
        for x in 0..8 {
            for y in 0..8 {
                image.put_pixel(x, y, Rgba([220, 40, 40, 255]));
            }
        }
        let mut engine = MedianCut::new(7, 1);
        let clusters = engine.clusters(&image).unwrap();
        assert!(clusters.colors()[0].distance(Color::rgb(30, 60, 200)) < 5.0);
    }

    #[test]
    fn transparent_and_white_pixels_are_ignored() {
        let transparent = RgbaImage::from_pixel(16, 16, Rgba([10, 200, 10, 0]));
        let white = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        let mut engine = MedianCut::default();
        assert_eq!(
            engine.clusters(&transparent).unwrap_err(),
            ClusterError::NoUsablePixels
        );
        assert_eq!(
            engine.clusters(&white).unwrap_err(),
            ClusterError::NoUsablePixels
        );
    }

    #[test]
    fn closures_act_as_clusterers() {
        let mut fixed =
            |_: &RgbaImage| -> Result<Vec<Color>, ClusterError> { Ok(vec![Color::rgb(1, 2, 3)]) };
        let image = RgbaImage::new(1, 1);
        let clusters = fixed.clusters(&image).unwrap();
        assert_eq!(clusters.colors(), &[Color::rgb(1, 2, 3)]);

        let mut empty = |_: &RgbaImage| -> Result<Vec<Color>, ClusterError> { Ok(Vec::new()) };
        assert_eq!(empty.clusters(&image).unwrap_err(), ClusterError::Empty);
    }
}
