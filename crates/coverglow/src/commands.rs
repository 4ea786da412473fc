use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use backdrop::{GradientEngine, SoftwareEngine, SoftwareOptions, SurfaceSize};
use coverpalette::{CoverImage, Extraction, Palette, PaletteExtractor};
use glowconfig::GlowConfig;
use tracing::{info, warn};

use crate::cli::{ConfigAction, PaletteArgs, StillArgs};
use crate::run::{config_path, curve_from_setting, load_config};

/// Extracts a palette, surfacing decode errors instead of keeping the
/// placeholder as the long-running path does.
fn extract_palette(config: &GlowConfig, cover: &Path) -> Result<Palette> {
    let image = CoverImage::open(cover)
        .with_context(|| format!("failed to read cover {}", cover.display()))?;
    let mut extractor = PaletteExtractor::new(config.extractor.settings())
        .with_placeholder(config.backdrop.placeholder_palette());
    match extractor.extract(&image, None) {
        Extraction::Retained(palette) => {
            warn!(cover = %cover.display(), "no usable colors in cover; using placeholder palette");
            Ok(palette)
        }
        extraction => Ok(extraction.palette()),
    }
}

pub fn palette(args: PaletteArgs, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let palette = extract_palette(&config, &args.cover)?;
    if args.json {
        let json = serde_json::to_string_pretty(&palette).context("failed to encode palette")?;
        println!("{json}");
    } else {
        for hex in palette.to_hex() {
            println!("{hex}");
        }
    }
    Ok(())
}

pub fn still(args: StillArgs, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let palette = extract_palette(&config, &args.cover)?;
    let (width, height) = args.size;
    let options = SoftwareOptions {
        blur: config.backdrop.blur,
        internal_scale: config.backdrop.internal_scale,
        curve: curve_from_setting(config.backdrop.curve),
    };
    let mut engine = SoftwareEngine::new(SurfaceSize::new(width, height), palette, options)
        .context("failed to create software engine")?;
    engine
        .advance_and_draw(args.time, Instant::now())
        .context("failed to render frame")?;
    engine
        .snapshot()
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    engine.dispose();
    info!(
        output = %args.output.display(),
        size = %engine.surface_size(),
        time = args.time,
        %palette,
        "wrote still frame"
    );
    Ok(())
}

pub fn config(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Where => {
            println!("{}", config_path(explicit)?.display());
        }
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            let rendered = config
                .to_toml_string()
                .context("failed to render configuration")?;
            print!("{rendered}");
        }
    }
    Ok(())
}
