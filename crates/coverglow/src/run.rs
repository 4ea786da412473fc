use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use backdrop::{
    run_window, BackdropOptions, CrossfadeCurve, GpuOptions, PaletteSource, WindowOptions,
};
use coverfeed::{CoverChange, CoverFeed};
use coverpalette::{Palette, PaletteExtractor};
use glowconfig::{BackdropSection, CurveSetting, FeedMode, GlowConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Where configuration is read from: the explicit `--config` file, or
/// `config.toml` in the config directory.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(AppPaths::discover()?.config_file()),
    }
}

/// Loads configuration. An explicit file must exist; the default location
/// may be absent, in which case built-in defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<GlowConfig> {
    let path = config_path(explicit)?;
    let config = if explicit.is_some() {
        GlowConfig::load(&path)
    } else {
        GlowConfig::load_or_default(&path)
    }
    .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    tracing::debug!(path = %path.display(), "resolved configuration");
    Ok(config)
}

pub fn apply_overrides(config: &mut GlowConfig, args: &RunArgs) -> Result<()> {
    if let Some(blur) = args.blur {
        config.backdrop.blur = blur;
    }
    if let Some(fps) = args.fps {
        config.backdrop.fps = fps;
    }
    if let Some(speed) = args.speed {
        config.backdrop.speed = speed;
    }
    if let Some(interval) = args.interval {
        config.feed.interval = interval;
    }
    if args.shuffle {
        config.feed.mode = FeedMode::Shuffle;
    }
    config
        .validate()
        .context("invalid value on the command line")?;
    Ok(())
}

pub fn curve_from_setting(setting: CurveSetting) -> CrossfadeCurve {
    match setting {
        CurveSetting::Linear => CrossfadeCurve::Linear,
        CurveSetting::Smoothstep => CrossfadeCurve::Smoothstep,
        CurveSetting::EaseInOut => CrossfadeCurve::EaseInOut,
    }
}

pub fn backdrop_options(section: &BackdropSection) -> BackdropOptions {
    BackdropOptions {
        blur: section.blur,
        fps: section.fps,
        speed: section.speed,
        transition: section.transition,
        curve: curve_from_setting(section.curve),
        resize_debounce: section.resize_debounce,
        ..BackdropOptions::default()
    }
}

pub fn run(args: RunArgs, config: Option<&Path>) -> Result<()> {
    let mut config = load_config(config)?;
    apply_overrides(&mut config, &args)?;

    let now = Instant::now();
    let feed = CoverFeed::from_config(&config.feed, args.covers.clone(), clock_seed(), now)
        .context("nothing to show; pass COVER paths or set feed.covers in the config")?;
    let placeholder = config.backdrop.placeholder_palette();
    let extractor = PaletteExtractor::new(config.extractor.settings()).with_placeholder(placeholder);
    info!(
        covers = feed.len(),
        mode = ?config.feed.mode,
        interval = ?config.feed.interval,
        fps = config.backdrop.fps,
        "starting coverglow"
    );

    let (width, height) = args.size.unwrap_or(DEFAULT_WINDOW_SIZE);
    let window = WindowOptions {
        title: "coverglow".to_string(),
        width: f64::from(width),
        height: f64::from(height),
        reduced_motion: args.reduced_motion,
        gpu: GpuOptions {
            force_fallback_adapter: args.software,
            ..GpuOptions::default()
        },
    };
    run_window(
        window,
        backdrop_options(&config.backdrop),
        placeholder,
        FeedSource::new(feed, extractor),
    )
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

/// Turns cover changes into palettes for the window.
pub struct FeedSource {
    feed: CoverFeed,
    extractor: PaletteExtractor,
    pending: Option<Palette>,
}

impl FeedSource {
    pub fn new(feed: CoverFeed, extractor: PaletteExtractor) -> Self {
        Self {
            feed,
            extractor,
            pending: None,
        }
    }

    fn apply(&mut self, change: CoverChange) -> Option<Palette> {
        if change.requires_refresh() {
            self.extractor.forget();
        }
        info!(
            path = %change.path.display(),
            reason = ?change.reason,
            "active cover changed"
        );
        let extraction = self.extractor.load_and_extract(&change.path, None);
        extraction.is_update().then(|| extraction.palette())
    }
}

impl PaletteSource for FeedSource {
    fn poll(&mut self, now: Instant) -> Option<Palette> {
        if let Some(palette) = self.pending.take() {
            return Some(palette);
        }
        let change = self.feed.tick(now)?;
        self.apply(change)
    }

    fn next_deadline(&self) -> Option<Instant> {
        if self.pending.is_some() {
            return Some(Instant::now());
        }
        self.feed.next_deadline()
    }

    fn advance(&mut self, now: Instant) {
        if let Some(change) = self.feed.skip(now) {
            self.pending = self.apply(change).or(self.pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use coverpalette::Color;

    fn write_cover(path: &Path, left: [u8; 3], right: [u8; 3]) {
        let mut image = image::RgbImage::new(32, 32);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            *pixel = image::Rgb(if x < 16 { left } else { right });
        }
        image.save(path).unwrap();
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = GlowConfig::default();
        let args = RunArgs {
            blur: Some(12.0),
            fps: Some(60.0),
            interval: Some(Duration::from_secs(5)),
            shuffle: true,
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.backdrop.blur, 12.0);
        assert_eq!(config.backdrop.fps, 60.0);
        assert_eq!(config.feed.interval, Duration::from_secs(5));
        assert_eq!(config.feed.mode, FeedMode::Shuffle);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut config = GlowConfig::default();
        let args = RunArgs {
            fps: Some(0.0),
            ..RunArgs::default()
        };
        assert!(apply_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn backdrop_options_follow_config() {
        let mut section = BackdropSection::default();
        section.curve = CurveSetting::EaseInOut;
        section.speed = 0.5;
        let options = backdrop_options(&section);
        assert_eq!(options.curve, CrossfadeCurve::EaseInOut);
        assert_eq!(options.speed, 0.5);
        assert_eq!(options.transition, Duration::from_millis(1200));
        assert_eq!(options.tick, BackdropOptions::default().tick);
    }

    #[test]
    fn feed_source_emits_palette_per_new_cover() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        write_cover(&first, [220, 30, 30], [30, 30, 220]);
        write_cover(&second, [30, 200, 60], [240, 200, 20]);

        let start = Instant::now();
        let feed = CoverFeed::new(
            vec![first, second],
            FeedMode::Continuous,
            Duration::from_secs(30),
            7,
            start,
        )
        .unwrap();
        let mut source = FeedSource::new(feed, PaletteExtractor::default());

        let initial = source.poll(start).expect("first cover palette");
        assert!(source.poll(start + Duration::from_secs(1)).is_none());

        source.advance(start + Duration::from_secs(2));
        assert_eq!(source.next_deadline().map(|_| ()), Some(()));
        let skipped = source.poll(start + Duration::from_secs(2)).expect("skipped cover");
        assert_ne!(initial, skipped);
        assert_ne!(skipped, Palette::from_colors([Color::gray(0); 4]));
    }

    #[test]
    fn unreadable_cover_keeps_previous_palette() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not an image").unwrap();

        let start = Instant::now();
        let feed = CoverFeed::new(
            vec![broken],
            FeedMode::Continuous,
            Duration::from_secs(30),
            1,
            start,
        )
        .unwrap();
        let extractor = PaletteExtractor::default().with_placeholder(Palette::PLACEHOLDER);
        let mut source = FeedSource::new(feed, extractor);
        assert!(source.poll(start).is_none());
    }
}
