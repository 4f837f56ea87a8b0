use clap::{Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_TICKER_MINUTES: f64 = 1.0;
pub const DEFAULT_OWM_MINUTES: f64 = 10.0;
pub const DEFAULT_NOAA_COOLDOWN_SECS: f64 = 60.0;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. A missing source section disables it.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub fps: Option<u32>,              // display tick rate
    pub cex: Option<TickerConfig>,
    pub blockchain: Option<TickerConfig>,
    pub openweathermap: Option<OpenWeatherConfig>,
    pub noaa: Option<NoaaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TickerConfig {
    pub update_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OpenWeatherConfig {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub api_key: Option<String>,
    pub update_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NoaaConfig {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Two-letter state code, e.g. "VA".
    pub state: Option<String>,
    pub cooldown_secs: Option<f64>,
}

impl Config {
    pub fn fps(&self) -> u32 {
        self.fps.unwrap_or(DEFAULT_FPS)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

impl TickerConfig {
    pub fn update_minutes(&self) -> f64 {
        self.update_minutes.unwrap_or(DEFAULT_TICKER_MINUTES)
    }
}

impl OpenWeatherConfig {
    pub fn update_minutes(&self) -> f64 {
        self.update_minutes.unwrap_or(DEFAULT_OWM_MINUTES)
    }
}

impl NoaaConfig {
    pub fn cooldown_secs(&self) -> f64 {
        self.cooldown_secs.unwrap_or(DEFAULT_NOAA_COOLDOWN_SECS)
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "ambidash", about = "Always-on clock, weather and ticker board", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub fps: Option<u32>,
    /// Latitude for every configured weather source
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,
    /// Longitude for every configured weather source
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// NWS state code
    #[arg(long)]
    pub state: Option<String>,
    /// OpenWeatherMap key; enables the source when set
    #[arg(long, env = "OWM_API_KEY", hide_env_values = true)]
    pub owm_api_key: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_with(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Same layering as [`load`] for an already-parsed command line.
pub fn load_with(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/ambidash/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/ambidash/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/ambidash.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["ambidash.yaml", "config.yaml", "config/ambidash.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    if src.fps.is_some()            { dst.fps = src.fps; }
    if src.cex.is_some()            { dst.cex = src.cex; }
    if src.blockchain.is_some()     { dst.blockchain = src.blockchain; }
    match (&mut dst.openweathermap, src.openweathermap) {
        (None, Some(c)) => dst.openweathermap = Some(c),
        (Some(d), Some(s)) => merge_owm(d, s),
        _ => {}
    }
    match (&mut dst.noaa, src.noaa) {
        (None, Some(c)) => dst.noaa = Some(c),
        (Some(d), Some(s)) => merge_noaa(d, s),
        _ => {}
    }
}

fn merge_owm(dst: &mut OpenWeatherConfig, src: OpenWeatherConfig) {
    if src.lat.is_some()            { dst.lat = src.lat; }
    if src.lon.is_some()            { dst.lon = src.lon; }
    if src.api_key.is_some()        { dst.api_key = src.api_key; }
    if src.update_minutes.is_some() { dst.update_minutes = src.update_minutes; }
}

fn merge_noaa(dst: &mut NoaaConfig, src: NoaaConfig) {
    if src.lat.is_some()            { dst.lat = src.lat; }
    if src.lon.is_some()            { dst.lon = src.lon; }
    if src.state.is_some()          { dst.state = src.state; }
    if src.cooldown_secs.is_some()  { dst.cooldown_secs = src.cooldown_secs; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    if cli.fps.is_some()             { cfg.fps = cli.fps; }

    if cli.owm_api_key.is_some() && cfg.openweathermap.is_none() {
        cfg.openweathermap = Some(OpenWeatherConfig::default());
    }
    if let Some(owm) = cfg.openweathermap.as_mut() {
        if cli.lat.is_some()         { owm.lat = cli.lat; }
        if cli.lon.is_some()         { owm.lon = cli.lon; }
        if cli.owm_api_key.is_some() { owm.api_key = cli.owm_api_key.clone(); }
    }

    if cli.state.is_some() && cfg.noaa.is_none() {
        cfg.noaa = Some(NoaaConfig::default());
    }
    if let Some(noaa) = cfg.noaa.as_mut() {
        if cli.lat.is_some()         { noaa.lat = cli.lat; }
        if cli.lon.is_some()         { noaa.lon = cli.lon; }
        if cli.state.is_some()       { noaa.state = cli.state.clone(); }
    }
}

fn validate_coords(section: &str, lat: Option<f64>, lon: Option<f64>) -> Result<(), ConfigError> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(ConfigError::Validation(format!(
                    "{section}: coordinates out of range: {lat}, {lon}"
                )));
            }
            Ok(())
        }
        _ => Err(ConfigError::Validation(format!("{section}: lat and lon are required"))),
    }
}

fn validate_interval(section: &str, value: Option<f64>) -> Result<(), ConfigError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ConfigError::Validation(format!(
            "{section}: update interval must be a non-negative number"
        ))),
        _ => Ok(()),
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.fps == Some(0) {
        return Err(ConfigError::Validation("fps must be > 0".into()));
    }
    if let Some(cex) = cfg.cex.as_ref() {
        validate_interval("cex", cex.update_minutes)?;
    }
    if let Some(bci) = cfg.blockchain.as_ref() {
        validate_interval("blockchain", bci.update_minutes)?;
    }
    if let Some(owm) = cfg.openweathermap.as_ref() {
        validate_coords("openweathermap", owm.lat, owm.lon)?;
        validate_interval("openweathermap", owm.update_minutes)?;
        if owm.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(ConfigError::Validation("openweathermap: api_key is required".into()));
        }
    }
    if let Some(noaa) = cfg.noaa.as_ref() {
        validate_coords("noaa", noaa.lat, noaa.lon)?;
        validate_interval("noaa", noaa.cooldown_secs)?;
        if let Some(state) = noaa.state.as_deref() {
            if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::Validation("noaa: state must be a two-letter code".into()));
            }
        }
    }
    Ok(())
}
