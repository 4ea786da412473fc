use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "coverglow",
    author,
    version,
    about = "Blurred mesh-gradient backdrop tinted by album cover art"
)]
pub struct Cli {
    /// Configuration file (defaults to `config.toml` in the config directory).
    #[arg(long, value_name = "FILE", global = true, env = "COVERGLOW_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Cover images to cycle through; replaces `feed.covers` from the config.
    #[arg(value_name = "COVER")]
    pub covers: Vec<PathBuf>,

    /// Blur radius in logical pixels.
    #[arg(long, value_name = "PX")]
    pub blur: Option<f32>,

    /// Cap on animation frames per second.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Animation speed multiplier.
    #[arg(long, value_name = "FACTOR")]
    pub speed: Option<f32>,

    /// Time each cover stays up (`30s`, `2m`, or plain seconds).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Visit covers in a shuffled order.
    #[arg(long)]
    pub shuffle: bool,

    /// Hold the gradient still; palette changes apply without a fade.
    #[arg(long)]
    pub reduced_motion: bool,

    /// Initial window size in logical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Use wgpu's software adapter instead of the GPU.
    #[arg(long)]
    pub software: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the four-color palette extracted from a cover.
    Palette(PaletteArgs),
    /// Render a single frame with the CPU engine and save it as PNG.
    Still(StillArgs),
    /// Inspect configuration.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct PaletteArgs {
    #[arg(value_name = "COVER")]
    pub cover: PathBuf,

    /// Emit a JSON object keyed by slot instead of one hex color per line.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct StillArgs {
    #[arg(value_name = "COVER")]
    pub cover: PathBuf,

    /// Destination PNG.
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    /// Output size in pixels.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "1280x720")]
    pub size: (u32, u32),

    /// Animation time to render, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub time: f64,
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file path that would be loaded.
    Where,
    /// Print the effective configuration as TOML.
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Ok(Duration::from_secs_f64(seconds));
        }
        return Err(format!("duration must be a non-negative number, got '{trimmed}'"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{trimmed}': {err}"))
}
