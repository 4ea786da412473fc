//! Four-color palette extraction from album cover art.
//!
//! The pipeline is deliberately small:
//!
//! ```text
//!   CoverImage ──▶ Clusterer (MedianCut or caller supplied)
//!                       │ RawClusterSet
//!                       ▼
//!   drop near-gray ─▶ sort by luminance ─▶ pick light / mid / shadow / accent
//!                                                   │
//!                                                   ▼
//!                               Palette { shadow, body, accent, highlight }
//! ```
//!
//! `PaletteExtractor` memoizes on the image source so re-delivering the same
//! cover is free, and never surfaces an error to the caller: failures are
//! logged and the previously held palette stays in effect.

mod cluster;
mod color;
mod extract;

pub use cluster::{
    ClusterError, Clusterer, MedianCut, RawClusterSet, DEFAULT_CLUSTER_COUNT, DEFAULT_QUALITY,
};
pub use color::{Color, Palette, ParseColorError};
pub use extract::{
    palette_from_clusters, CoverImage, ExtractError, Extraction, ExtractorSettings,
    PaletteExtractor, SourceId, DEFAULT_SATURATION_THRESHOLD,
};
