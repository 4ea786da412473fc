use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use coverpalette::{Color, ExtractorSettings, Palette};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    #[default]
    Continuous,
    Shuffle,
}

/// Easing shape used when cross-fading between palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveSetting {
    Linear,
    #[default]
    Smoothstep,
    EaseInOut,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GlowConfig {
    pub version: u32,
    #[serde(default)]
    pub backdrop: BackdropSection,
    #[serde(default)]
    pub extractor: ExtractorSection,
    #[serde(default)]
    pub feed: FeedSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackdropSection {
    /// Blur radius in CSS-style pixels.
    pub blur: f32,
    pub fps: f32,
    pub speed: f32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub transition: Duration,
    pub curve: CurveSetting,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub resize_debounce: Duration,
    /// Resolution factor of the software engine's raster.
    pub internal_scale: f32,
    pub placeholder: [Color; 4],
}

impl Default for BackdropSection {
    fn default() -> Self {
        Self {
            blur: 80.0,
            fps: 30.0,
            speed: 1.0,
            transition: Duration::from_millis(1200),
            curve: CurveSetting::default(),
            resize_debounce: Duration::from_millis(100),
            internal_scale: 0.25,
            placeholder: Palette::PLACEHOLDER.colors(),
        }
    }
}

impl BackdropSection {
    pub fn placeholder_palette(&self) -> Palette {
        Palette::from_colors(self.placeholder)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractorSection {
    pub cluster_count: usize,
    pub quality: u32,
    pub saturation_threshold: f32,
}

impl Default for ExtractorSection {
    fn default() -> Self {
        let settings = ExtractorSettings::default();
        Self {
            cluster_count: settings.cluster_count,
            quality: settings.quality,
            saturation_threshold: settings.saturation_threshold,
        }
    }
}

impl ExtractorSection {
    pub fn settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            cluster_count: self.cluster_count,
            quality: self.quality,
            saturation_threshold: self.saturation_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedSection {
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
    pub mode: FeedMode,
    /// Re-read a cover when its modification time changes.
    pub watch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub covers: Vec<PathBuf>,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            mode: FeedMode::default(),
            watch: false,
            seed: None,
            covers: Vec::new(),
        }
    }
}

impl Default for GlowConfig {
    fn default() -> Self {
        Self {
            version: 1,
            backdrop: BackdropSection::default(),
            extractor: ExtractorSection::default(),
            feed: FeedSection::default(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v.trim())
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a finite non-negative number"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_duration(*duration))
}

impl GlowConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: GlowConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when it exists; a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let backdrop = &self.backdrop;
        if !backdrop.blur.is_finite() || backdrop.blur < 0.0 {
            return Err(ConfigError::Invalid("backdrop.blur must be >= 0".into()));
        }
        if !backdrop.fps.is_finite() || backdrop.fps <= 0.0 {
            return Err(ConfigError::Invalid("backdrop.fps must be > 0".into()));
        }
        if !backdrop.speed.is_finite() || backdrop.speed <= 0.0 {
            return Err(ConfigError::Invalid("backdrop.speed must be > 0".into()));
        }
        if !(backdrop.internal_scale > 0.0 && backdrop.internal_scale <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "backdrop.internal_scale must be within (0, 1]; got {}",
                backdrop.internal_scale
            )));
        }

        let extractor = &self.extractor;
        if !(6..=8).contains(&extractor.cluster_count) {
            return Err(ConfigError::Invalid(format!(
                "extractor.cluster_count must be between 6 and 8; got {}",
                extractor.cluster_count
            )));
        }
        if extractor.quality == 0 {
            return Err(ConfigError::Invalid(
                "extractor.quality must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&extractor.saturation_threshold) {
            return Err(ConfigError::Invalid(format!(
                "extractor.saturation_threshold must be within [0, 1]; got {}",
                extractor.saturation_threshold
            )));
        }

        if self.feed.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "feed.interval must be greater than zero".into(),
            ));
        }
        for cover in &self.feed.covers {
            if cover.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "feed.covers contains an empty path".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
version = 1

[backdrop]
blur = 60
fps = 24
speed = 0.5
transition = "800ms"
curve = "ease-in-out"
resize_debounce = 0.25
placeholder = ["#000", "#101010", "#202020", "#303030"]

[extractor]
cluster_count = 8
quality = 4

[feed]
interval = "2m"
mode = "shuffle"
watch = true
seed = 7
covers = ["/tmp/now-playing.jpg", "/tmp/other.png"]
"##;

    #[test]
    fn parses_sample_config() {
        let config = GlowConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.backdrop.blur, 60.0);
        assert_eq!(config.backdrop.fps, 24.0);
        assert_eq!(config.backdrop.transition, Duration::from_millis(800));
        assert_eq!(config.backdrop.curve, CurveSetting::EaseInOut);
        assert_eq!(config.backdrop.resize_debounce, Duration::from_millis(250));
        assert_eq!(config.backdrop.internal_scale, 0.25);
        assert_eq!(
            config.backdrop.placeholder_palette().shadow,
            Color::gray(0)
        );
        assert_eq!(config.extractor.settings().cluster_count, 8);
        assert_eq!(config.extractor.settings().saturation_threshold, 0.13);
        assert_eq!(config.feed.interval, Duration::from_secs(120));
        assert_eq!(config.feed.mode, FeedMode::Shuffle);
        assert_eq!(config.feed.seed, Some(7));
        assert_eq!(config.feed.covers.len(), 2);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = GlowConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config, GlowConfig::default());
        assert_eq!(config.backdrop.placeholder_palette(), Palette::PLACEHOLDER);
        assert_eq!(config.backdrop.transition, Duration::from_millis(1200));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = GlowConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for body in [
            "[backdrop]\nfps = 0",
            "[backdrop]\nspeed = -1.0",
            "[backdrop]\ninternal_scale = 1.5",
            "[extractor]\ncluster_count = 12",
            "[extractor]\nquality = 0",
            "[feed]\ninterval = 0",
        ] {
            let input = format!("version = 1\n{body}\n");
            let err = GlowConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{body}: {err}");
        }
    }

    #[test]
    fn rejects_bad_placeholder_hex() {
        let err = GlowConfig::from_toml_str(
            "version = 1\n[backdrop]\nplaceholder = [\"#111\", \"#222\", \"#333\", \"nope\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rendered_config_reads_back() {
        let config = GlowConfig::from_toml_str(SAMPLE).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("transition = \"800ms\""), "{rendered}");
        assert_eq!(GlowConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            GlowConfig::load_or_default(Path::new("/nonexistent/coverglow/config.toml")).unwrap();
        assert_eq!(config, GlowConfig::default());
    }
}
