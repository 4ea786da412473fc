use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::cluster::{
    ClusterError, Clusterer, MedianCut, RawClusterSet, DEFAULT_CLUSTER_COUNT, DEFAULT_QUALITY,
};
use crate::color::{Color, Palette};

/// Clusters below this HSV saturation count as near-gray.
pub const DEFAULT_SATURATION_THRESHOLD: f32 = 0.13;
/// Fewer survivors than this and the gray filter is discarded.
const MIN_SURVIVORS: usize = 3;
/// Minimum L*a*b* distance for a color to qualify as the accent.
const ACCENT_EPSILON: f32 = 1.0;

const SHADOW_DARKEN: f32 = 0.35;
const ACCENT_SATURATE: f32 = 0.35;
const HIGHLIGHT_LIGHTEN: f32 = 0.12;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to decode cover image at {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Identity of an image source, used as the memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        SourceId(id.into())
    }

    pub fn from_path(path: &Path) -> Self {
        SourceId(path.display().to_string())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded bitmap tagged with where it came from.
#[derive(Debug, Clone)]
pub struct CoverImage {
    source: SourceId,
    pixels: RgbaImage,
}

impl CoverImage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|source| ExtractError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            source: SourceId::from_path(path),
            pixels: decoded.to_rgba8(),
        })
    }

    pub fn from_rgba(source: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            source: SourceId::new(source),
            pixels,
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorSettings {
    /// Target size of the raw cluster set (6..=8 is sensible).
    pub cluster_count: usize,
    /// Pixel sampling stride of the default clusterer.
    pub quality: u32,
    pub saturation_threshold: f32,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            cluster_count: DEFAULT_CLUSTER_COUNT,
            quality: DEFAULT_QUALITY,
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
        }
    }
}

/// Result of one extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// A new palette was computed from the image.
    Fresh(Palette),
    /// Same source as last time; the held palette is returned untouched.
    Memoized(Palette),
    /// Extraction failed; the previously held palette stays in place.
    Retained(Palette),
}

impl Extraction {
    pub fn palette(&self) -> Palette {
        match self {
            Extraction::Fresh(palette)
            | Extraction::Memoized(palette)
            | Extraction::Retained(palette) => *palette,
        }
    }

    /// True only when a new palette should be pushed to the renderer.
    pub fn is_update(&self) -> bool {
        matches!(self, Extraction::Fresh(_))
    }
}

/// Turns cover images into four-color palettes, remembering the last source
/// so re-delivering the same cover does no work.
#[derive(Debug)]
pub struct PaletteExtractor {
    settings: ExtractorSettings,
    engine: MedianCut,
    last_source: Option<SourceId>,
    current: Palette,
}

impl PaletteExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self {
            engine: MedianCut::new(settings.cluster_count, settings.quality),
            settings,
            last_source: None,
            current: Palette::PLACEHOLDER,
        }
    }

    pub fn with_placeholder(mut self, palette: Palette) -> Self {
        self.current = palette;
        self
    }

    /// The palette currently held (placeholder until the first success).
    pub fn current(&self) -> Palette {
        self.current
    }

    /// Drops the memoization guard so the next call re-extracts even for the
    /// same source.
    pub fn forget(&mut self) {
        self.last_source = None;
    }

    pub fn extract(
        &mut self,
        image: &CoverImage,
        custom: Option<&mut dyn Clusterer>,
    ) -> Extraction {
        if self.last_source.as_ref() == Some(image.source()) {
            debug!(source = %image.source(), "cover unchanged; reusing palette");
            return Extraction::Memoized(self.current);
        }

        let clusters = match custom {
            Some(clusterer) => clusterer.clusters(image.pixels()),
            None => self.engine.clusters(image.pixels()),
        };

        match clusters {
            Ok(clusters) => {
                let palette = palette_from_clusters(&clusters, self.settings.saturation_threshold);
                debug!(
                    source = %image.source(),
                    clusters = clusters.len(),
                    palette = %palette,
                    "extracted cover palette"
                );
                self.current = palette;
                self.last_source = Some(image.source().clone());
                Extraction::Fresh(palette)
            }
            Err(err) => {
                warn!(
                    source = %image.source(),
                    error = %err,
                    "palette extraction failed; keeping previous palette"
                );
                Extraction::Retained(self.current)
            }
        }
    }

    /// Decodes `path` and extracts from it. Decode failures are logged and
    /// leave the held palette in place.
    pub fn load_and_extract(
        &mut self,
        path: &Path,
        custom: Option<&mut dyn Clusterer>,
    ) -> Extraction {
        let source = SourceId::from_path(path);
        if self.last_source.as_ref() == Some(&source) {
            debug!(source = %source, "cover unchanged; skipping decode");
            return Extraction::Memoized(self.current);
        }

        match CoverImage::open(path) {
            Ok(image) => self.extract(&image, custom),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    cause = ?std::error::Error::source(&err),
                    "failed to load cover; keeping previous palette"
                );
                Extraction::Retained(self.current)
            }
        }
    }
}

impl Default for PaletteExtractor {
    fn default() -> Self {
        Self::new(ExtractorSettings::default())
    }
}

/// Orders a raw cluster set into `shadow, body, accent, highlight`.
pub fn palette_from_clusters(clusters: &RawClusterSet, saturation_threshold: f32) -> Palette {
    let vivid: Vec<Color> = clusters
        .colors()
        .iter()
        .copied()
        .filter(|color| color.saturation() >= saturation_threshold)
        .collect();
    let mut survivors = if vivid.len() < MIN_SURVIVORS {
        clusters.colors().to_vec()
    } else {
        vivid
    };

    survivors.sort_by(|a, b| b.luminance().total_cmp(&a.luminance()));

    let light = survivors[0];
    let shadow = survivors[survivors.len() - 1];
    let mid_index = survivors.len() / 2;
    let mid = survivors[mid_index];

    let accent = survivors
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != mid_index)
        .map(|(_, color)| (*color, color.distance(mid)))
        .filter(|(_, distance)| *distance > ACCENT_EPSILON)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(color, _)| color)
        .unwrap_or(light);

    Palette {
        shadow: shadow.darken(SHADOW_DARKEN),
        body: mid,
        accent: accent.saturate(ACCENT_SATURATE),
        highlight: light.lighten(HIGHLIGHT_LIGHTEN),
    }
}
